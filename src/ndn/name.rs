use std::fmt;
use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;

/// Hierarchical name: an ordered list of opaque byte components.
///
/// Ordering is component-wise, so a prefix always sorts directly before the
/// names it covers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    pub fn new() -> Name {
        Name { components: Vec::new() }
    }

    /// Parses `/a/b/c`; components are percent-decoded.
    pub fn from_uri(uri: &str) -> Result<Name, AbacError> {
        let mut name = Name::new();
        for component in uri.split('/').filter(|c| !c.is_empty()) {
            name.components.push(percent_decode(component)?);
        }
        Ok(name)
    }

    /// Returns a copy with `component` appended.
    pub fn append(&self, component: impl AsRef<[u8]>) -> Name {
        let mut name = self.clone();
        name.push(component);
        name
    }

    /// Returns a copy with the Name TLV of `other` appended as one component.
    pub fn append_name(&self, other: &Name) -> Name {
        self.append(other.wire_encode().encode())
    }

    /// Returns a copy with all components of `other` appended.
    pub fn join(&self, other: &Name) -> Name {
        let mut name = self.clone();
        name.components.extend(other.components.iter().cloned());
        name
    }

    pub fn push(&mut self, component: impl AsRef<[u8]>) {
        self.components.push(component.as_ref().to_vec());
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.components.get(index).map(Vec::as_slice)
    }

    /// Component `index` decoded as an embedded Name TLV.
    pub fn get_name(&self, index: usize) -> Result<Name, AbacError> {
        let component = self.get(index).ok_or_else(|| {
            AbacError::Encoding(format!("name {} has no component {}", self, index))
        })?;
        Name::wire_decode(&Block::decode(component)?)
    }

    /// Component `index` as UTF-8 text.
    pub fn get_text(&self, index: usize) -> Result<String, AbacError> {
        let component = self.get(index).ok_or_else(|| {
            AbacError::Encoding(format!("name {} has no component {}", self, index))
        })?;
        Ok(String::from_utf8(component.to_vec())?)
    }

    pub fn sub_name(&self, start: usize, count: usize) -> Name {
        Name {
            components: self.components.iter().skip(start).take(count).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    pub fn wire_encode(&self) -> Block {
        let components: Vec<Block> = self
            .components
            .iter()
            .map(|c| Block::new(types::NAME_COMPONENT, c.clone()))
            .collect();
        Block::nested(types::NAME, &components)
    }

    pub fn wire_decode(block: &Block) -> Result<Name, AbacError> {
        block.expect_type(types::NAME)?;
        let mut reader = block.reader()?;
        let components = reader
            .repeated(types::NAME_COMPONENT)
            .into_iter()
            .map(|c| c.value().to_vec())
            .collect();
        reader.finish()?;
        Ok(Name { components })
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        self.components
            .iter()
            .map(|c| format!("/{}", percent_encode(c)))
            .collect()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self.to_uri())
    }
}

fn percent_encode(component: &[u8]) -> String {
    let mut out = String::with_capacity(component.len());
    for &byte in component {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn percent_decode(component: &str) -> Result<Vec<u8>, AbacError> {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = component
                .get(i + 1..i + 3)
                .ok_or_else(|| AbacError::Encoding(format!("bad escape in {}", component)))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| AbacError::Encoding(format!("bad escape in {}", component)))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}
