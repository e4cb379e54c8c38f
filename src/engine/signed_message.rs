use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;

/// An attribute signature over a message carried next to it.
///
/// Encoded as `Content{ PlainTextSize, SignatureBlob }`; the size lets the
/// verifier reject a message of the wrong length before any cryptography.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedMessage {
    pub plaintext_size: u64,
    pub signature: Vec<u8>,
}

impl SignedMessage {
    pub fn wire_encode(&self) -> Block {
        Block::nested(types::CONTENT, &[
            Block::from_u64(types::PLAINTEXT_SIZE, self.plaintext_size),
            Block::new(types::SIGNATURE_BLOB, self.signature.clone()),
        ])
    }

    pub fn wire_decode(block: &Block) -> Result<SignedMessage, AbacError> {
        block.expect_type(types::CONTENT)?;
        let mut reader = block.reader()?;
        let plaintext_size = reader.expect(types::PLAINTEXT_SIZE)?.to_u64()?;
        let signature = reader.expect(types::SIGNATURE_BLOB)?.value().to_vec();
        reader.finish()?;
        Ok(SignedMessage { plaintext_size, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_is_strict() {
        let signed = SignedMessage { plaintext_size: 1024, signature: vec![1, 2, 3] };
        let block = Block::decode(&signed.wire_encode().encode()).unwrap();
        assert_eq!(SignedMessage::wire_decode(&block).unwrap(), signed);

        let wrong_outer = Block::nested(types::DATA, &[Block::from_u64(types::PLAINTEXT_SIZE, 1)]);
        assert!(SignedMessage::wire_decode(&wrong_outer).is_err());

        let trailing = Block::nested(types::CONTENT, &[
            Block::from_u64(types::PLAINTEXT_SIZE, 3),
            Block::new(types::SIGNATURE_BLOB, vec![0u8]),
            Block::new(types::ATTRIBUTE, b"extra".to_vec()),
        ]);
        assert!(SignedMessage::wire_decode(&trailing).is_err());
    }
}
