//! Patch scripts: one command per line, arguments separated by whitespace, `#` starts a comment.
//!
//! Scripts are applied to every input file in turn, so unlike the library calls no command names
//! a file.
//!
//! ```text
//! beginreplace
//! replace Game.Player Cheats.Player
//! endreplace
//!
//! beginextend 0x1000
//! extend Game.Player Update 5
//! endextend
//!
//! beginmodify
//! writeloadarg Game.Player Update 0 0
//! writecall Game.Player Update 1 Cheats.Hooks OnUpdate
//! writenops Game.Player TakeDamage 0 5
//! endmodify
//! ```

use anyhow::{anyhow, bail, Context};
use dotpatch::patch::RefOpcode;

/// The method and code position an operand write targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub type_name: String,
    pub method: String,
    pub position: u32,
}

/// One parsed script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    BeginReplace,
    Replace {
        source: String,
        target: String,
    },
    EndReplace,
    BeginExtend {
        size: u32,
    },
    Extend {
        type_name: String,
        method: String,
        insert: u32,
    },
    EndExtend,
    BeginModify,
    WriteLoadArg {
        site: Site,
        index: u32,
    },
    WriteLoadLocal {
        site: Site,
        index: u32,
    },
    /// `ldfld`, `ldsfld`, `call` or `callvirt` against a member of `target_type`
    WriteReference {
        site: Site,
        opcode: RefOpcode,
        target_type: String,
        member: String,
    },
    WriteNops {
        site: Site,
        count: usize,
    },
    WriteBytes {
        site: Site,
        bytes: Vec<u8>,
    },
    EndModify,
    Log(String),
}

/// A parsed script: steps paired with their 1-based source line.
#[derive(Debug, Default)]
pub struct Script {
    steps: Vec<(usize, Step)>,
}

impl Script {
    /// Parses a whole script. The first bad line fails the parse.
    pub fn parse(text: &str) -> anyhow::Result<Script> {
        let mut steps = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split_once('#').map_or(raw, |(code, _)| code).trim();
            if line.is_empty() {
                continue;
            }
            let step = parse_line(line).with_context(|| format!("line {}: {raw}", index + 1))?;
            steps.push((index + 1, step));
        }
        Ok(Script { steps })
    }

    pub fn steps(&self) -> &[(usize, Step)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Cursor over the arguments of one line
struct Args<'a> {
    command: &'a str,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn text(&mut self, what: &str) -> anyhow::Result<String> {
        self.tokens
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("'{}' is missing its {what} argument", self.command))
    }

    fn number(&mut self, what: &str) -> anyhow::Result<u32> {
        let token = self.text(what)?;
        parse_number(&token).with_context(|| format!("invalid {what} '{token}'"))
    }

    fn site(&mut self) -> anyhow::Result<Site> {
        Ok(Site {
            type_name: self.text("type")?,
            method: self.text("method")?,
            position: self.number("position")?,
        })
    }

    fn reference(&mut self, opcode: RefOpcode) -> anyhow::Result<Step> {
        Ok(Step::WriteReference {
            site: self.site()?,
            opcode,
            target_type: self.text("target type")?,
            member: self.text("member")?,
        })
    }

    fn rest(self) -> Vec<&'a str> {
        self.tokens.collect()
    }

    fn finish(mut self) -> anyhow::Result<()> {
        match self.tokens.next() {
            Some(extra) => bail!("unexpected argument '{extra}' to '{}'", self.command),
            None => Ok(()),
        }
    }
}

fn parse_line(line: &str) -> anyhow::Result<Step> {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        bail!("empty command");
    };
    let command_lower = command.to_ascii_lowercase();
    let mut args = Args { command, tokens };

    let step = match command_lower.as_str() {
        "log" => return Ok(Step::Log(args.rest().join(" "))),
        "writebytes" => {
            let site = args.site()?;
            let bytes = args
                .rest()
                .into_iter()
                .map(parse_byte)
                .collect::<anyhow::Result<Vec<u8>>>()?;
            if bytes.is_empty() {
                bail!("'writebytes' needs at least one byte");
            }
            return Ok(Step::WriteBytes { site, bytes });
        }
        "beginreplace" => Step::BeginReplace,
        "replace" => Step::Replace {
            source: args.text("source type")?,
            target: args.text("target type")?,
        },
        "endreplace" => Step::EndReplace,
        "beginextend" => Step::BeginExtend {
            size: args.number("size")?,
        },
        "extend" => Step::Extend {
            type_name: args.text("type")?,
            method: args.text("method")?,
            insert: args.number("insert size")?,
        },
        "endextend" => Step::EndExtend,
        "beginmodify" => Step::BeginModify,
        "writeloadarg" => Step::WriteLoadArg {
            site: args.site()?,
            index: args.number("index")?,
        },
        "writeloadlocal" => Step::WriteLoadLocal {
            site: args.site()?,
            index: args.number("index")?,
        },
        "writeloadfield" => args.reference(RefOpcode::Ldfld)?,
        "writeloadstaticfield" => args.reference(RefOpcode::Ldsfld)?,
        "writecall" => args.reference(RefOpcode::Call)?,
        "writecallvirt" => args.reference(RefOpcode::Callvirt)?,
        "writenops" => Step::WriteNops {
            site: args.site()?,
            count: args.number("count")? as usize,
        },
        "endmodify" => Step::EndModify,
        _ => bail!("unknown command '{command}'"),
    };

    args.finish()?;
    Ok(step)
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number(token: &str) -> anyhow::Result<u32> {
    let value = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => token.parse()?,
    };
    Ok(value)
}

/// Bytes are always hex, with or without a `0x` prefix.
fn parse_byte(token: &str) -> anyhow::Result<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u8::from_str_radix(digits, 16).with_context(|| format!("invalid byte '{token}'"))
}
