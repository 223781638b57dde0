//! Builds minimal managed PE images in memory.
//!
//! The produced image has one `.text` section (RVA 0x2000, file pointer 0x200) holding the CLI
//! header, the method bodies and the metadata root with the "#~", "#Strings", "#US", "#GUID" and
//! "#Blob" streams. The tables stream carries Module, TypeDef, Field (if any) and MethodDef
//! (if any). The first TypeDef row is always `<Module>`.
//!
//! Shared between the unit tests and the integration tests under `tests/`.

#![allow(dead_code)]

/// Section alignment of built images
pub const SECTION_ALIGNMENT: u32 = 0x2000;
/// File alignment of built images
pub const FILE_ALIGNMENT: u32 = 0x200;
/// RVA of the `.text` section
pub const TEXT_RVA: u32 = 0x2000;
/// File pointer of the `.text` section
pub const TEXT_POINTER: u32 = 0x200;

const PE_POINTER: usize = 0x80;

/// `void ()`
pub const SIG_VOID: &[u8] = &[0x00, 0x00, 0x01];
/// `void (int32)`
pub const SIG_VOID_I4: &[u8] = &[0x00, 0x01, 0x01, 0x08];
/// instance `void ()`
pub const SIG_INSTANCE_VOID: &[u8] = &[0x20, 0x00, 0x01];
/// field `int32`
pub const SIG_FIELD_I4: &[u8] = &[0x06, 0x08];

/// A tiny method body around `code`.
pub fn tiny_body(code: &[u8]) -> Vec<u8> {
    assert!(code.len() < 64);
    let mut body = vec![((code.len() as u8) << 2) | 0x02];
    body.extend_from_slice(code);
    body
}

/// A fat method body around `code`. `eh` is an already encoded exception section (without the
/// alignment padding in front of it).
pub fn fat_body(max_stack: u16, code: &[u8], local_var_sig_token: u32, eh: Option<&[u8]>) -> Vec<u8> {
    let mut flags: u16 = 0x3003;
    if eh.is_some() {
        flags |= 0x08;
    }

    let mut body = Vec::new();
    body.extend_from_slice(&flags.to_le_bytes());
    body.extend_from_slice(&max_stack.to_le_bytes());
    body.extend_from_slice(&(code.len() as u32).to_le_bytes());
    body.extend_from_slice(&local_var_sig_token.to_le_bytes());
    body.extend_from_slice(code);
    if let Some(eh) = eh {
        while body.len() % 4 != 0 {
            body.push(0);
        }
        body.extend_from_slice(eh);
    }
    body
}

/// A method of a [`TestType`].
#[derive(Clone)]
pub struct TestMethod {
    pub name: String,
    pub signature: Vec<u8>,
    /// Complete body including the header; empty for methods without a body (RVA 0)
    pub body: Vec<u8>,
}

/// A field of a [`TestType`].
#[derive(Clone)]
pub struct TestField {
    pub name: String,
    pub signature: Vec<u8>,
}

/// A type to be emitted into the TypeDef table.
#[derive(Clone)]
pub struct TestType {
    pub namespace: String,
    pub name: String,
    pub fields: Vec<TestField>,
    pub methods: Vec<TestMethod>,
}

impl TestType {
    pub fn new(namespace: &str, name: &str) -> Self {
        TestType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, name: &str, signature: &[u8], body: Vec<u8>) -> Self {
        self.methods.push(TestMethod {
            name: name.to_string(),
            signature: signature.to_vec(),
            body,
        });
        self
    }

    pub fn field(mut self, name: &str, signature: &[u8]) -> Self {
        self.fields.push(TestField {
            name: name.to_string(),
            signature: signature.to_vec(),
        });
        self
    }
}

/// The result of [`ManagedImageBuilder::build`].
pub struct BuiltImage {
    pub bytes: Vec<u8>,
    /// RVA of every MethodDef row, in row order
    pub method_rvas: Vec<u32>,
    /// File offset of the first MethodDef row
    pub methoddef_offset: usize,
    /// Size of one MethodDef row
    pub methoddef_row_size: usize,
    /// File offset of the first TypeDef row
    pub typedef_offset: usize,
    /// Size of one TypeDef row
    pub typedef_row_size: usize,
    /// RVA of the metadata root
    pub metadata_rva: u32,
}

impl BuiltImage {
    /// File offset of the RVA column of MethodDef row `row` (1-based).
    pub fn method_rva_offset(&self, row: usize) -> usize {
        self.methoddef_offset + (row - 1) * self.methoddef_row_size
    }

    /// RVA of MethodDef row `row` (1-based), read from the bytes.
    pub fn method_rva(&self, row: usize) -> u32 {
        let offset = self.method_rva_offset(row);
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }
}

/// Builder for minimal managed images.
pub struct ManagedImageBuilder {
    pe32_plus: bool,
    wide_strings: bool,
    wide_blobs: bool,
    with_clr_directory: bool,
    uncompressed_tables: bool,
    types: Vec<TestType>,
}

struct Heap {
    data: Vec<u8>,
}

impl Heap {
    fn new() -> Self {
        Heap { data: vec![0] }
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        let index = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        index
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        let index = self.data.len() as u32;
        let len = value.len();
        if len < 0x80 {
            self.data.push(len as u8);
        } else {
            assert!(len < 0x4000);
            self.data.push(0x80 | (len >> 8) as u8);
            self.data.push(len as u8);
        }
        self.data.extend_from_slice(value);
        index
    }

    fn padded(mut self) -> Vec<u8> {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        self.data
    }
}

fn put_index(out: &mut Vec<u8>, value: u32, wide: bool) {
    if wide {
        out.extend_from_slice(&value.to_le_bytes());
    } else {
        out.extend_from_slice(&(value as u16).to_le_bytes());
    }
}

fn align(out: &mut Vec<u8>, to: usize) {
    while out.len() % to != 0 {
        out.push(0);
    }
}

fn round_up(value: u32, to: u32) -> u32 {
    value.div_ceil(to) * to
}

impl Default for ManagedImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedImageBuilder {
    pub fn new() -> Self {
        ManagedImageBuilder {
            pe32_plus: false,
            wide_strings: false,
            wide_blobs: false,
            with_clr_directory: true,
            uncompressed_tables: false,
            types: Vec::new(),
        }
    }

    pub fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    /// Sets the 4-byte "#Strings" index flag.
    pub fn wide_string_heap(mut self) -> Self {
        self.wide_strings = true;
        self
    }

    /// Sets the 4-byte "#Blob" index flag.
    pub fn wide_blob_heap(mut self) -> Self {
        self.wide_blobs = true;
        self
    }

    pub fn without_clr_directory(mut self) -> Self {
        self.with_clr_directory = false;
        self
    }

    /// Names the tables stream "#-".
    pub fn uncompressed_tables(mut self) -> Self {
        self.uncompressed_tables = true;
        self
    }

    pub fn add_type(mut self, ty: TestType) -> Self {
        self.types.push(ty);
        self
    }

    pub fn build(&self) -> BuiltImage {
        let mut text = vec![0u8; 72];
        align(&mut text, 8);

        // method bodies
        let mut method_rvas = Vec::new();
        for method in self.types.iter().flat_map(|ty| ty.methods.iter()) {
            if method.body.is_empty() {
                method_rvas.push(0);
                continue;
            }
            align(&mut text, 4);
            method_rvas.push(TEXT_RVA + text.len() as u32);
            text.extend_from_slice(&method.body);
        }
        align(&mut text, 4);

        let metadata_start = text.len();
        let metadata_rva = TEXT_RVA + metadata_start as u32;
        let (metadata, tables_offset, typedef_rel, typedef_row_size, methoddef_rel, methoddef_row_size) =
            self.metadata(&method_rvas);
        text.extend_from_slice(&metadata);

        // CLI header
        let mut cor20 = Vec::new();
        cor20.extend_from_slice(&72u32.to_le_bytes());
        cor20.extend_from_slice(&2u16.to_le_bytes());
        cor20.extend_from_slice(&5u16.to_le_bytes());
        cor20.extend_from_slice(&metadata_rva.to_le_bytes());
        cor20.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        cor20.extend_from_slice(&1u32.to_le_bytes());
        cor20.resize(72, 0);
        text[..72].copy_from_slice(&cor20);

        let virtual_size = text.len() as u32;
        let raw_size = round_up(virtual_size, FILE_ALIGNMENT);
        let size_of_image = round_up(TEXT_RVA + virtual_size, SECTION_ALIGNMENT);

        let mut bytes = vec![0u8; TEXT_POINTER as usize];
        bytes[0] = b'M';
        bytes[1] = b'Z';
        bytes[0x3C..0x40].copy_from_slice(&(PE_POINTER as u32).to_le_bytes());

        let mut pe = Vec::new();
        pe.extend_from_slice(b"PE\0\0");
        let optional_size: u16 = if self.pe32_plus { 240 } else { 224 };
        pe.extend_from_slice(&(if self.pe32_plus { 0x8664u16 } else { 0x014Cu16 }).to_le_bytes());
        pe.extend_from_slice(&1u16.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&optional_size.to_le_bytes());
        pe.extend_from_slice(&0x2102u16.to_le_bytes());

        // optional header
        pe.extend_from_slice(&(if self.pe32_plus { 0x20Bu16 } else { 0x10Bu16 }).to_le_bytes());
        pe.push(8);
        pe.push(0);
        pe.extend_from_slice(&raw_size.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
        if self.pe32_plus {
            pe.extend_from_slice(&0x1_8000_0000u64.to_le_bytes());
        } else {
            pe.extend_from_slice(&0u32.to_le_bytes());
            pe.extend_from_slice(&0x0040_0000u32.to_le_bytes());
        }
        pe.extend_from_slice(&SECTION_ALIGNMENT.to_le_bytes());
        pe.extend_from_slice(&FILE_ALIGNMENT.to_le_bytes());
        for version in [4u16, 0, 0, 0, 4, 0] {
            pe.extend_from_slice(&version.to_le_bytes());
        }
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&size_of_image.to_le_bytes());
        pe.extend_from_slice(&TEXT_POINTER.to_le_bytes());
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&3u16.to_le_bytes());
        pe.extend_from_slice(&0x8540u16.to_le_bytes());
        for value in [0x10_0000u64, 0x1000, 0x10_0000, 0x1000] {
            if self.pe32_plus {
                pe.extend_from_slice(&value.to_le_bytes());
            } else {
                pe.extend_from_slice(&(value as u32).to_le_bytes());
            }
        }
        pe.extend_from_slice(&0u32.to_le_bytes());
        pe.extend_from_slice(&16u32.to_le_bytes());
        for index in 0..16 {
            if index == 14 && self.with_clr_directory {
                pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
                pe.extend_from_slice(&72u32.to_le_bytes());
            } else {
                pe.extend_from_slice(&[0u8; 8]);
            }
        }

        // section table
        pe.extend_from_slice(b".text\0\0\0");
        pe.extend_from_slice(&virtual_size.to_le_bytes());
        pe.extend_from_slice(&TEXT_RVA.to_le_bytes());
        pe.extend_from_slice(&raw_size.to_le_bytes());
        pe.extend_from_slice(&TEXT_POINTER.to_le_bytes());
        pe.extend_from_slice(&[0u8; 12]);
        pe.extend_from_slice(&0x6000_0020u32.to_le_bytes());

        bytes[PE_POINTER..PE_POINTER + pe.len()].copy_from_slice(&pe);

        text.resize(raw_size as usize, 0);
        bytes.extend_from_slice(&text);

        let tables_file = TEXT_POINTER as usize + metadata_start + tables_offset;
        BuiltImage {
            bytes,
            method_rvas,
            methoddef_offset: tables_file + methoddef_rel,
            methoddef_row_size,
            typedef_offset: tables_file + typedef_rel,
            typedef_row_size,
            metadata_rva,
        }
    }

    /// Returns the metadata block, the offset of the first table row within it, and the
    /// offsets (relative to the first table row) and row sizes of TypeDef and MethodDef.
    fn metadata(&self, method_rvas: &[u32]) -> (Vec<u8>, usize, usize, usize, usize, usize) {
        let mut strings = Heap::new();
        let mut blobs = Heap::new();

        let field_count: usize = self.types.iter().map(|ty| ty.fields.len()).sum();
        let method_count: usize = self.types.iter().map(|ty| ty.methods.len()).sum();
        let type_count = self.types.len() + 1;

        let mut valid: u64 = (1 << 0x00) | (1 << 0x02);
        if field_count > 0 {
            valid |= 1 << 0x04;
        }
        if method_count > 0 {
            valid |= 1 << 0x06;
        }

        let mut heap_sizes = 0u8;
        if self.wide_strings {
            heap_sizes |= 0x01;
        }
        if self.wide_blobs {
            heap_sizes |= 0x04;
        }

        let mut tables = Vec::new();
        tables.extend_from_slice(&0u32.to_le_bytes());
        tables.push(2);
        tables.push(0);
        tables.push(heap_sizes);
        tables.push(1);
        tables.extend_from_slice(&valid.to_le_bytes());
        tables.extend_from_slice(&0u64.to_le_bytes());
        tables.extend_from_slice(&1u32.to_le_bytes());
        tables.extend_from_slice(&(type_count as u32).to_le_bytes());
        if field_count > 0 {
            tables.extend_from_slice(&(field_count as u32).to_le_bytes());
        }
        if method_count > 0 {
            tables.extend_from_slice(&(method_count as u32).to_le_bytes());
        }
        let rows_start = tables.len();

        // Module
        let module_name = strings.string("test.dll");
        tables.extend_from_slice(&0u16.to_le_bytes());
        put_index(&mut tables, module_name, self.wide_strings);
        put_index(&mut tables, 1, false);
        put_index(&mut tables, 0, false);
        put_index(&mut tables, 0, false);

        // TypeDef
        let typedef_rel = tables.len() - rows_start;
        let typedef_start = tables.len();
        let module_type = strings.string("<Module>");
        tables.extend_from_slice(&0u32.to_le_bytes());
        put_index(&mut tables, module_type, self.wide_strings);
        put_index(&mut tables, 0, self.wide_strings);
        put_index(&mut tables, 0, false);
        put_index(&mut tables, 1, false);
        put_index(&mut tables, 1, false);
        let typedef_row_size = tables.len() - typedef_start;

        let mut field_list = 1u32;
        let mut method_list = 1u32;
        for ty in &self.types {
            let name = strings.string(&ty.name);
            let namespace = strings.string(&ty.namespace);
            tables.extend_from_slice(&0x0010_0001u32.to_le_bytes());
            put_index(&mut tables, name, self.wide_strings);
            put_index(&mut tables, namespace, self.wide_strings);
            put_index(&mut tables, 0, false);
            put_index(&mut tables, field_list, false);
            put_index(&mut tables, method_list, false);
            field_list += ty.fields.len() as u32;
            method_list += ty.methods.len() as u32;
        }

        // Field
        for field in self.types.iter().flat_map(|ty| ty.fields.iter()) {
            let name = strings.string(&field.name);
            let signature = blobs.blob(&field.signature);
            tables.extend_from_slice(&0x0006u16.to_le_bytes());
            put_index(&mut tables, name, self.wide_strings);
            put_index(&mut tables, signature, self.wide_blobs);
        }

        // MethodDef
        let methoddef_rel = tables.len() - rows_start;
        let mut methoddef_row_size = 0;
        for (method, rva) in self
            .types
            .iter()
            .flat_map(|ty| ty.methods.iter())
            .zip(method_rvas)
        {
            let start = tables.len();
            let name = strings.string(&method.name);
            let signature = blobs.blob(&method.signature);
            let flags: u16 = if method.name.starts_with('.') { 0x1886 } else { 0x0086 };
            tables.extend_from_slice(&rva.to_le_bytes());
            tables.extend_from_slice(&0u16.to_le_bytes());
            tables.extend_from_slice(&flags.to_le_bytes());
            put_index(&mut tables, name, self.wide_strings);
            put_index(&mut tables, signature, self.wide_blobs);
            put_index(&mut tables, 1, false);
            methoddef_row_size = tables.len() - start;
        }
        align(&mut tables, 4);

        let strings = strings.padded();
        let blobs = blobs.padded();
        let us = vec![0u8; 4];
        let guid = vec![0x11u8; 16];

        let tables_name: &[u8] = if self.uncompressed_tables { b"#-" } else { b"#~" };
        let streams: [(&[u8], &Vec<u8>); 5] = [
            (tables_name, &tables),
            (b"#Strings", &strings),
            (b"#US", &us),
            (b"#GUID", &guid),
            (b"#Blob", &blobs),
        ];

        let mut root = Vec::new();
        root.extend_from_slice(&0x424A_5342u32.to_le_bytes());
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&0u32.to_le_bytes());
        root.extend_from_slice(&12u32.to_le_bytes());
        root.extend_from_slice(b"v4.0.30319\0\0");
        root.extend_from_slice(&0u16.to_le_bytes());
        root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        let headers_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + (name.len() + 1).div_ceil(4) * 4)
            .sum();
        let mut offset = root.len() + headers_len;
        let tables_offset = offset;
        for (name, data) in &streams {
            root.extend_from_slice(&(offset as u32).to_le_bytes());
            root.extend_from_slice(&(data.len() as u32).to_le_bytes());
            root.extend_from_slice(name);
            root.push(0);
            align(&mut root, 4);
            offset += data.len();
        }
        for (_, data) in &streams {
            root.extend_from_slice(data);
        }

        (
            root,
            tables_offset + rows_start,
            typedef_rel,
            typedef_row_size,
            methoddef_rel,
            methoddef_row_size,
        )
    }
}

/// The standard two-type image: `A.Foo` and `B.Foo` with identical signatures and different
/// bodies, plus constructors on both types.
pub fn two_type_image() -> BuiltImage {
    ManagedImageBuilder::new()
        .add_type(
            TestType::new("Demo", "A")
                .method(".ctor", SIG_INSTANCE_VOID, tiny_body(&[0x02, 0x2A]))
                .method("Foo", SIG_VOID, tiny_body(&[0x17, 0x26, 0x2A])),
        )
        .add_type(
            TestType::new("Demo", "B")
                .method(".ctor", SIG_INSTANCE_VOID, tiny_body(&[0x00, 0x02, 0x2A]))
                .method("Foo", SIG_VOID, tiny_body(&[0x18, 0x26, 0x2A])),
        )
        .build()
}
