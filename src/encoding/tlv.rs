use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::iter::Peekable;
use crate::error::AbacError;

/// One decoded (or to-be-encoded) TLV element.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    typ: u64,
    value: Bytes,
}

impl Block {
    pub fn new(typ: u64, value: impl Into<Bytes>) -> Block {
        Block { typ, value: value.into() }
    }

    pub fn empty(typ: u64) -> Block {
        Block { typ, value: Bytes::new() }
    }

    /// Element whose value is the concatenation of `children`.
    pub fn nested(typ: u64, children: &[Block]) -> Block {
        let mut buf = BytesMut::with_capacity(children.iter().map(Block::encoded_len).sum());
        for child in children {
            child.encode_into(&mut buf);
        }
        Block { typ, value: buf.freeze() }
    }

    /// NonNegativeInteger element, shortest of 1, 2, 4 or 8 bytes.
    pub fn from_u64(typ: u64, number: u64) -> Block {
        let mut buf = BytesMut::with_capacity(8);
        if number <= u8::MAX as u64 {
            buf.put_u8(number as u8);
        } else if number <= u16::MAX as u64 {
            buf.put_u16(number as u16);
        } else if number <= u32::MAX as u64 {
            buf.put_u32(number as u32);
        } else {
            buf.put_u64(number);
        }
        Block { typ, value: buf.freeze() }
    }

    pub fn from_text(typ: u64, text: &str) -> Block {
        Block { typ, value: Bytes::copy_from_slice(text.as_bytes()) }
    }

    pub fn typ(&self) -> u64 {
        self.typ
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn value_bytes(&self) -> Bytes {
        self.value.clone()
    }

    pub fn expect_type(&self, typ: u64) -> Result<&Block, AbacError> {
        if self.typ != typ {
            return Err(AbacError::Encoding(format!(
                "expected TLV type {}, found {}",
                typ, self.typ
            )));
        }
        Ok(self)
    }

    pub fn to_u64(&self) -> Result<u64, AbacError> {
        let mut value = self.value.clone();
        match value.len() {
            1 => Ok(value.get_u8() as u64),
            2 => Ok(value.get_u16() as u64),
            4 => Ok(value.get_u32() as u64),
            8 => Ok(value.get_u64()),
            other => Err(AbacError::Encoding(format!(
                "invalid NonNegativeInteger length {}",
                other
            ))),
        }
    }

    pub fn to_text(&self) -> Result<String, AbacError> {
        Ok(String::from_utf8(self.value.to_vec())?)
    }

    pub fn encoded_len(&self) -> usize {
        var_number_len(self.typ) + var_number_len(self.value.len() as u64) + self.value.len()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        write_var_number(buf, self.typ);
        write_var_number(buf, self.value.len() as u64);
        buf.put_slice(&self.value);
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decodes exactly one element; trailing bytes are an error.
    pub fn decode(wire: &[u8]) -> Result<Block, AbacError> {
        let mut buf = Bytes::copy_from_slice(wire);
        let block = read_block(&mut buf)?;
        if buf.has_remaining() {
            return Err(AbacError::Encoding(format!(
                "{} trailing bytes after TLV type {}",
                buf.remaining(),
                block.typ
            )));
        }
        Ok(block)
    }

    /// Parses the value as a sequence of elements.
    pub fn elements(&self) -> Result<Vec<Block>, AbacError> {
        let mut buf = self.value.clone();
        let mut elements = Vec::new();
        while buf.has_remaining() {
            elements.push(read_block(&mut buf)?);
        }
        Ok(elements)
    }

    pub fn reader(&self) -> Result<ElementReader, AbacError> {
        Ok(ElementReader {
            parent: self.typ,
            elements: self.elements()?.into_iter().peekable(),
        })
    }
}

/// Ordered, strict walk over the children of one element.
pub struct ElementReader {
    parent: u64,
    elements: Peekable<std::vec::IntoIter<Block>>,
}

impl ElementReader {
    /// Takes the next element, which must be of type `typ`.
    pub fn expect(&mut self, typ: u64) -> Result<Block, AbacError> {
        match self.elements.next() {
            Some(block) if block.typ == typ => Ok(block),
            Some(block) => Err(AbacError::Encoding(format!(
                "unexpected TLV type {} inside {} (expected {})",
                block.typ, self.parent, typ
            ))),
            None => Err(AbacError::Encoding(format!(
                "missing TLV type {} inside {}",
                typ, self.parent
            ))),
        }
    }

    /// Takes the next element only if it is of type `typ`.
    pub fn optional(&mut self, typ: u64) -> Option<Block> {
        match self.elements.peek() {
            Some(block) if block.typ == typ => self.elements.next(),
            _ => None,
        }
    }

    /// Takes all consecutive elements of type `typ`.
    pub fn repeated(&mut self, typ: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        while let Some(block) = self.optional(typ) {
            blocks.push(block);
        }
        blocks
    }

    /// Fails if anything is left unread.
    pub fn finish(mut self) -> Result<(), AbacError> {
        match self.elements.next() {
            None => Ok(()),
            Some(block) => Err(AbacError::Encoding(format!(
                "trailing TLV type {} inside {}",
                block.typ, self.parent
            ))),
        }
    }
}

fn var_number_len(number: u64) -> usize {
    if number < 253 {
        1
    } else if number <= u16::MAX as u64 {
        3
    } else if number <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

fn write_var_number(buf: &mut BytesMut, number: u64) {
    if number < 253 {
        buf.put_u8(number as u8);
    } else if number <= u16::MAX as u64 {
        buf.put_u8(253);
        buf.put_u16(number as u16);
    } else if number <= u32::MAX as u64 {
        buf.put_u8(254);
        buf.put_u32(number as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(number);
    }
}

fn read_var_number(buf: &mut Bytes) -> Result<u64, AbacError> {
    if !buf.has_remaining() {
        return Err(AbacError::Encoding("truncated VarNumber".into()));
    }
    let first = buf.get_u8();
    let width = match first {
        253 => 2,
        254 => 4,
        255 => 8,
        small => return Ok(small as u64),
    };
    if buf.remaining() < width {
        return Err(AbacError::Encoding("truncated VarNumber".into()));
    }
    Ok(match width {
        2 => buf.get_u16() as u64,
        4 => buf.get_u32() as u64,
        _ => buf.get_u64(),
    })
}

fn read_block(buf: &mut Bytes) -> Result<Block, AbacError> {
    let typ = read_var_number(buf)?;
    let length = read_var_number(buf)?;
    if length > buf.remaining() as u64 {
        return Err(AbacError::Encoding(format!(
            "TLV type {} declares {} bytes, {} available",
            typ,
            length,
            buf.remaining()
        )));
    }
    let value = buf.split_to(length as usize);
    Ok(Block { typ, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_numbers_use_the_shortest_width() {
        assert_eq!(Block::new(8, vec![0u8; 252]).encode().len(), 1 + 1 + 252);
        assert_eq!(Block::new(8, vec![0u8; 253]).encode().len(), 1 + 3 + 253);
        assert_eq!(Block::new(300, vec![0u8; 70_000]).encode().len(), 3 + 5 + 70_000);
    }

    #[test]
    fn non_negative_integers() {
        for number in [0u64, 255, 256, 65_535, 65_536, u32::MAX as u64 + 1] {
            let block = Block::from_u64(133, number);
            assert_eq!(block.to_u64().unwrap(), number);
        }
        assert_eq!(Block::from_u64(133, 1024).value().len(), 2);
        assert!(Block::new(133, vec![0u8; 3]).to_u64().is_err());
    }

    #[test]
    fn nested_elements_decode_strictly() {
        let outer = Block::nested(21, &[
            Block::from_u64(133, 5),
            Block::new(130, b"hello".to_vec()),
        ]);
        let decoded = Block::decode(&outer.encode()).unwrap();
        assert_eq!(decoded, outer);

        let mut reader = decoded.reader().unwrap();
        assert_eq!(reader.expect(133).unwrap().to_u64().unwrap(), 5);
        assert_eq!(reader.expect(130).unwrap().value(), b"hello");
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn out_of_order_and_trailing_fields_are_rejected() {
        let outer = Block::nested(21, &[
            Block::new(130, b"x".to_vec()),
            Block::from_u64(133, 1),
        ]);
        let mut reader = outer.reader().unwrap();
        assert!(matches!(reader.expect(133), Err(AbacError::Encoding(_))));

        let mut reader = outer.reader().unwrap();
        reader.expect(130).unwrap();
        assert!(matches!(reader.finish(), Err(AbacError::Encoding(_))));
    }

    #[test]
    fn truncated_and_trailing_wire_is_rejected() {
        let wire = Block::new(21, b"abc".to_vec()).encode();
        assert!(Block::decode(&wire[..wire.len() - 1]).is_err());

        let mut extended = wire.to_vec();
        extended.push(0);
        assert!(Block::decode(&extended).is_err());
    }
}
