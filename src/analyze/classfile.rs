// src/analyze/classfile.rs

//! Just enough of the JVM class-file format to describe a class's outward
//! shape.
//!
//! We walk the constant pool, the class header, fields, methods and their
//! attributes. Code bodies and debug attributes are skipped over without
//! being decoded; only `RuntimeVisibleAnnotations` is looked into, and only
//! for the annotation type names.

use std::collections::HashMap;

use super::AnalyzerError;

const MAGIC: u32 = 0xCAFE_BABE;
const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";

/// Externally observable structure of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassShape {
    pub access: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<String>,
    /// Sorted by (name, descriptor); declaration order is not observable.
    pub fields: Vec<MemberShape>,
    /// Sorted by (name, descriptor).
    pub methods: Vec<MemberShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemberShape {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub annotations: Vec<String>,
}

impl ClassShape {
    pub fn parse(bytes: &[u8]) -> Result<Self, AnalyzerError> {
        let mut r = Reader::new(bytes);
        let pool = ConstantPool::read(&mut r)?;

        let access = r.u2()?;
        let name = pool.class_name(r.u2()?)?.replace('/', ".");
        let super_index = r.u2()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?.replace('/', "."))
        };

        let interface_count = r.u2()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(r.u2()?)?.replace('/', "."));
        }

        let mut fields = read_members(&mut r, &pool)?;
        let mut methods = read_members(&mut r, &pool)?;
        fields.sort();
        methods.sort();

        let annotations = read_attributes(&mut r, &pool)?;

        Ok(Self {
            access,
            name,
            super_name,
            interfaces,
            annotations,
            fields,
            methods,
        })
    }
}

/// Binary name of the class in `bytes` (e.g. `com.example.Foo`).
///
/// Stops reading right after the `this_class` index, so a file that is still
/// being written fails only if the header itself is incomplete.
pub fn class_name(bytes: &[u8]) -> Result<String, AnalyzerError> {
    let mut r = Reader::new(bytes);
    let pool = ConstantPool::read(&mut r)?;
    let _access = r.u2()?;
    Ok(pool.class_name(r.u2()?)?.replace('/', "."))
}

fn read_members(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<Vec<MemberShape>, AnalyzerError> {
    let count = r.u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = r.u2()?;
        let name = pool.utf8(r.u2()?)?.to_string();
        let descriptor = pool.utf8(r.u2()?)?.to_string();
        let annotations = read_attributes(r, pool)?;
        members.push(MemberShape {
            name,
            descriptor,
            access,
            annotations,
        });
    }
    Ok(members)
}

/// Read an attribute table, returning the annotation types it declares.
fn read_attributes(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<Vec<String>, AnalyzerError> {
    let count = r.u2()?;
    let mut annotations = Vec::new();
    for _ in 0..count {
        let name = pool.utf8(r.u2()?)?;
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        if name == RUNTIME_VISIBLE_ANNOTATIONS {
            let mut inner = Reader::new(body);
            let n = inner.u2()?;
            for _ in 0..n {
                annotations.push(read_annotation(&mut inner, pool)?);
            }
        }
    }
    annotations.sort();
    Ok(annotations)
}

fn read_annotation(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<String, AnalyzerError> {
    let type_name = pool.utf8(r.u2()?)?.to_string();
    let pairs = r.u2()?;
    for _ in 0..pairs {
        let _element_name = r.u2()?;
        skip_element_value(r, pool)?;
    }
    Ok(type_name)
}

fn skip_element_value(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<(), AnalyzerError> {
    let tag = r.u1()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            r.u2()?;
        }
        b'e' => {
            r.u2()?;
            r.u2()?;
        }
        b'@' => {
            read_annotation(r, pool)?;
        }
        b'[' => {
            let n = r.u2()?;
            for _ in 0..n {
                skip_element_value(r, pool)?;
            }
        }
        other => {
            return Err(AnalyzerError::Malformed(format!(
                "unknown element_value tag {:?}",
                other as char
            )));
        }
    }
    Ok(())
}

#[derive(Debug)]
enum Constant<'a> {
    Utf8(&'a [u8]),
    Class(u16),
    Other,
}

#[derive(Debug)]
struct ConstantPool<'a> {
    entries: HashMap<u16, Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    fn read(r: &mut Reader<'a>) -> Result<Self, AnalyzerError> {
        let magic = r.u4()?;
        if magic != MAGIC {
            return Err(AnalyzerError::BadMagic(magic));
        }
        let _minor = r.u2()?;
        let _major = r.u2()?;

        let count = r.u2()?;
        let mut entries = HashMap::with_capacity(count as usize);
        let mut index = 1u16;
        while index < count {
            let tag = r.u1()?;
            let constant = match tag {
                1 => {
                    let len = r.u2()? as usize;
                    Constant::Utf8(r.take(len)?)
                }
                7 => Constant::Class(r.u2()?),
                3 | 4 => {
                    r.take(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    r.take(8)?;
                    Constant::Other
                }
                8 | 16 | 19 | 20 => {
                    r.u2()?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.take(4)?;
                    Constant::Other
                }
                15 => {
                    r.take(3)?;
                    Constant::Other
                }
                other => return Err(AnalyzerError::UnknownConstant { tag: other, index }),
            };
            entries.insert(index, constant);
            // Long and double take two slots.
            index = index.saturating_add(if matches!(tag, 5 | 6) { 2 } else { 1 });
        }

        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<&'a str, AnalyzerError> {
        match self.entries.get(&index) {
            Some(Constant::Utf8(bytes)) => std::str::from_utf8(*bytes).map_err(|_| {
                AnalyzerError::BadConstant {
                    index,
                    expected: "utf8 text",
                }
            }),
            _ => Err(AnalyzerError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&'a str, AnalyzerError> {
        match self.entries.get(&index) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => Err(AnalyzerError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], AnalyzerError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(AnalyzerError::Truncated { offset: self.pos })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, AnalyzerError> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, AnalyzerError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, AnalyzerError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `public class a.B extends java.lang.Object {}` with no members.
    fn tiny_class() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&MAGIC.to_be_bytes());
        b.extend_from_slice(&[0, 0, 0, 52]);
        b.extend_from_slice(&5u16.to_be_bytes());
        // #1 Utf8 "a/B"
        b.push(1);
        b.extend_from_slice(&3u16.to_be_bytes());
        b.extend_from_slice(b"a/B");
        // #2 Class #1
        b.push(7);
        b.extend_from_slice(&1u16.to_be_bytes());
        // #3 Utf8 "java/lang/Object"
        b.push(1);
        b.extend_from_slice(&16u16.to_be_bytes());
        b.extend_from_slice(b"java/lang/Object");
        // #4 Class #3
        b.push(7);
        b.extend_from_slice(&3u16.to_be_bytes());
        // access, this, super
        b.extend_from_slice(&0x0021u16.to_be_bytes());
        b.extend_from_slice(&2u16.to_be_bytes());
        b.extend_from_slice(&4u16.to_be_bytes());
        // interfaces, fields, methods, attributes
        b.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        b
    }

    #[test]
    fn parses_minimal_class() {
        let shape = ClassShape::parse(&tiny_class()).unwrap();
        assert_eq!(shape.name, "a.B");
        assert_eq!(shape.super_name.as_deref(), Some("java.lang.Object"));
        assert!(shape.fields.is_empty());
        assert!(shape.methods.is_empty());
    }

    #[test]
    fn class_name_reads_only_the_header() {
        let mut bytes = tiny_class();
        // Drop everything after this_class.
        bytes.truncate(bytes.len() - 10);
        assert_eq!(class_name(&bytes).unwrap(), "a.B");
        assert!(ClassShape::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = tiny_class();
        bytes[0] = 0;
        assert!(matches!(
            ClassShape::parse(&bytes),
            Err(AnalyzerError::BadMagic(_))
        ));
    }

    #[test]
    fn truncated_pool_is_reported_with_offset() {
        let bytes = &tiny_class()[..14];
        assert!(matches!(
            class_name(bytes),
            Err(AnalyzerError::Truncated { .. })
        ));
    }
}
