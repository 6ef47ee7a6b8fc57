//! Hand-assembled class files for analyzer and translation tests.
//!
//! Only the parts reloadq reads are modelled: header, super class,
//! interfaces, fields, methods (optionally with a `Code` body and a
//! `LineNumberTable`), `RuntimeVisibleAnnotations` and `SourceFile`.

use std::collections::HashMap;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;

#[derive(Debug, Clone)]
struct Member {
    access: u16,
    name: String,
    descriptor: String,
    annotations: Vec<String>,
    code: Option<(Vec<u8>, u16)>,
}

/// Builder producing the bytes of a class file.
///
/// Class names may be given dotted (`com.example.Foo`) or in internal form
/// (`com/example/Foo`).
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    access: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    annotations: Vec<String>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    source_file: Option<String>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            access: ACC_PUBLIC | ACC_SUPER,
            name: internal(name),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            annotations: vec![],
            fields: vec![],
            methods: vec![],
            source_file: None,
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_name = Some(internal(name));
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(internal(name));
        self
    }

    /// `descriptor` is a type descriptor, e.g. `Lorg/example/Component;`.
    pub fn annotation(mut self, descriptor: &str) -> Self {
        self.annotations.push(descriptor.to_string());
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push(member(ACC_PUBLIC, name, descriptor));
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str) -> Self {
        self.methods.push(member(ACC_PUBLIC, name, descriptor));
        self
    }

    /// A method with a bytecode body whose first instruction sits on `line`.
    pub fn method_with_body(mut self, name: &str, descriptor: &str, body: &[u8], line: u16) -> Self {
        let mut m = member(ACC_PUBLIC, name, descriptor);
        m.code = Some((body.to_vec(), line));
        self.methods.push(m);
        self
    }

    pub fn annotated_method(mut self, name: &str, descriptor: &str, annotation: &str) -> Self {
        let mut m = member(ACC_PUBLIC, name, descriptor);
        m.annotations.push(annotation.to_string());
        self.methods.push(m);
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut body = Vec::new();

        put_u2(&mut body, self.access);
        put_u2(&mut body, pool.class(&self.name));
        let super_index = match &self.super_name {
            Some(name) => pool.class(name),
            None => 0,
        };
        put_u2(&mut body, super_index);

        put_u2(&mut body, self.interfaces.len() as u16);
        for iface in &self.interfaces {
            put_u2(&mut body, pool.class(iface));
        }

        for members in [&self.fields, &self.methods] {
            put_u2(&mut body, members.len() as u16);
            for m in members {
                write_member(&mut body, &mut pool, m);
            }
        }

        let mut attributes = Vec::new();
        if !self.annotations.is_empty() {
            attributes.push(annotations_attribute(&mut pool, &self.annotations));
        }
        if let Some(file) = &self.source_file {
            let mut data = Vec::new();
            put_u2(&mut data, pool.utf8(file));
            attributes.push((pool.utf8("SourceFile"), data));
        }
        write_attributes(&mut body, &attributes);

        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE];
        put_u2(&mut out, 0);
        put_u2(&mut out, 61);
        pool.write(&mut out);
        out.extend_from_slice(&body);
        out
    }
}

fn internal(name: &str) -> String {
    name.replace('.', "/")
}

fn member(access: u16, name: &str, descriptor: &str) -> Member {
    Member {
        access,
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        annotations: vec![],
        code: None,
    }
}

fn write_member(out: &mut Vec<u8>, pool: &mut Pool, m: &Member) {
    put_u2(out, m.access);
    put_u2(out, pool.utf8(&m.name));
    put_u2(out, pool.utf8(&m.descriptor));

    let mut attributes = Vec::new();
    if let Some((code, line)) = &m.code {
        let mut line_table = Vec::new();
        put_u2(&mut line_table, 1);
        put_u2(&mut line_table, 0);
        put_u2(&mut line_table, *line);

        let mut data = Vec::new();
        put_u2(&mut data, 2);
        put_u2(&mut data, 2);
        put_u4(&mut data, code.len() as u32);
        data.extend_from_slice(code);
        put_u2(&mut data, 0);
        write_attributes(&mut data, &[(pool.utf8("LineNumberTable"), line_table)]);
        attributes.push((pool.utf8("Code"), data));
    }
    if !m.annotations.is_empty() {
        attributes.push(annotations_attribute(pool, &m.annotations));
    }
    write_attributes(out, &attributes);
}

fn annotations_attribute(pool: &mut Pool, annotations: &[String]) -> (u16, Vec<u8>) {
    let mut data = Vec::new();
    put_u2(&mut data, annotations.len() as u16);
    for a in annotations {
        put_u2(&mut data, pool.utf8(a));
        put_u2(&mut data, 0);
    }
    (pool.utf8("RuntimeVisibleAnnotations"), data)
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    put_u2(out, attributes.len() as u16);
    for (name, data) in attributes {
        put_u2(out, *name);
        put_u4(out, data.len() as u32);
        out.extend_from_slice(data);
    }
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

#[derive(Default)]
struct Pool {
    entries: Vec<Vec<u8>>,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl Pool {
    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(&i) = self.utf8.get(s) {
            return i;
        }
        let mut entry = vec![1];
        put_u2(&mut entry, s.len() as u16);
        entry.extend_from_slice(s.as_bytes());
        let i = self.push(entry);
        self.utf8.insert(s.to_string(), i);
        i
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&i) = self.classes.get(name) {
            return i;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        put_u2(&mut entry, name_index);
        let i = self.push(entry);
        self.classes.insert(name.to_string(), i);
        i
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}
