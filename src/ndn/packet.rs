use std::time::Duration;
use bytes::{Bytes, BytesMut};
use rand::Rng;
use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;
use super::name::Name;

/// Default Interest lifetime, as in NDN.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SignatureType {
    Sha256WithRsa,
    Ed25519,
}

impl SignatureType {
    fn code(self) -> u64 {
        match self {
            SignatureType::Sha256WithRsa => 1,
            SignatureType::Ed25519 => 5,
        }
    }

    fn from_code(code: u64) -> Result<SignatureType, AbacError> {
        match code {
            1 => Ok(SignatureType::Sha256WithRsa),
            5 => Ok(SignatureType::Ed25519),
            other => Err(AbacError::Encoding(format!("unsupported signature type {}", other))),
        }
    }
}

/// Algorithm and the name of the key that produced the signature.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    pub key_locator: Name,
}

impl SignatureInfo {
    fn wire_encode(&self, typ: u64) -> Block {
        Block::nested(typ, &[
            Block::from_u64(types::SIGNATURE_TYPE, self.signature_type.code()),
            Block::nested(types::KEY_LOCATOR, &[self.key_locator.wire_encode()]),
        ])
    }

    fn wire_decode(block: &Block) -> Result<SignatureInfo, AbacError> {
        let mut reader = block.reader()?;
        let signature_type = SignatureType::from_code(reader.expect(types::SIGNATURE_TYPE)?.to_u64()?)?;
        let locator = reader.expect(types::KEY_LOCATOR)?;
        reader.finish()?;
        let mut locator_reader = locator.reader()?;
        let key_locator = Name::wire_decode(&locator_reader.expect(types::NAME)?)?;
        locator_reader.finish()?;
        Ok(SignatureInfo { signature_type, key_locator })
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    pub info: SignatureInfo,
    pub value: Bytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContentType {
    Blob,
    /// Application-level rejection; the content carries a status.
    Nack,
}

impl ContentType {
    fn code(self) -> u64 {
        match self {
            ContentType::Blob => 0,
            ContentType::Nack => 3,
        }
    }

    fn from_code(code: u64) -> Result<ContentType, AbacError> {
        match code {
            0 => Ok(ContentType::Blob),
            3 => Ok(ContentType::Nack),
            other => Err(AbacError::Encoding(format!("unsupported content type {}", other))),
        }
    }
}

/// A request for the named data.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime: Duration,
    pub application_parameters: Option<Bytes>,
    pub signature: Option<Signature>,
}

impl Interest {
    pub fn new(name: Name) -> Interest {
        Interest {
            name,
            nonce: rand::thread_rng().gen(),
            lifetime: DEFAULT_INTEREST_LIFETIME,
            application_parameters: None,
            signature: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Interest {
        self.lifetime = lifetime;
        self
    }

    pub fn with_application_parameters(mut self, parameters: impl Into<Bytes>) -> Interest {
        self.application_parameters = Some(parameters.into());
        self
    }

    /// Draws a new nonce, as a retransmission must.
    pub fn refresh_nonce(&mut self) {
        self.nonce = rand::thread_rng().gen();
    }

    /// Bytes covered by the signature: name, parameters and signature info.
    pub fn signed_portion(&self, info: &SignatureInfo) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.name.wire_encode().encode_into(&mut buf);
        if let Some(parameters) = &self.application_parameters {
            Block::new(types::APPLICATION_PARAMETERS, parameters.clone()).encode_into(&mut buf);
        }
        info.wire_encode(types::INTEREST_SIGNATURE_INFO).encode_into(&mut buf);
        buf.to_vec()
    }

    /// An Interest matches every Data whose name it prefixes.
    pub fn matches(&self, data: &Data) -> bool {
        self.name.is_prefix_of(&data.name)
    }

    pub fn wire_encode(&self) -> Block {
        let mut elements = vec![
            self.name.wire_encode(),
            Block::new(types::NONCE, self.nonce.to_be_bytes().to_vec()),
            Block::from_u64(types::INTEREST_LIFETIME, self.lifetime.as_millis() as u64),
        ];
        if let Some(parameters) = &self.application_parameters {
            elements.push(Block::new(types::APPLICATION_PARAMETERS, parameters.clone()));
        }
        if let Some(signature) = &self.signature {
            elements.push(signature.info.wire_encode(types::INTEREST_SIGNATURE_INFO));
            elements.push(Block::new(types::INTEREST_SIGNATURE_VALUE, signature.value.clone()));
        }
        Block::nested(types::INTEREST, &elements)
    }

    pub fn wire_decode(block: &Block) -> Result<Interest, AbacError> {
        block.expect_type(types::INTEREST)?;
        let mut reader = block.reader()?;
        let name = Name::wire_decode(&reader.expect(types::NAME)?)?;
        let nonce_block = reader.expect(types::NONCE)?;
        let nonce = u32::from_be_bytes(nonce_block.value().try_into()?);
        let lifetime = Duration::from_millis(reader.expect(types::INTEREST_LIFETIME)?.to_u64()?);
        let application_parameters = reader
            .optional(types::APPLICATION_PARAMETERS)
            .map(|b| b.value_bytes());
        let signature = match reader.optional(types::INTEREST_SIGNATURE_INFO) {
            Some(info) => Some(Signature {
                info: SignatureInfo::wire_decode(&info)?,
                value: reader.expect(types::INTEREST_SIGNATURE_VALUE)?.value_bytes(),
            }),
            None => None,
        };
        reader.finish()?;
        Ok(Interest { name, nonce, lifetime, application_parameters, signature })
    }
}

/// A named, signed piece of content.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Data {
    pub name: Name,
    pub content_type: ContentType,
    pub content: Bytes,
    pub signature: Option<Signature>,
}

impl Data {
    pub fn new(name: Name) -> Data {
        Data {
            name,
            content_type: ContentType::Blob,
            content: Bytes::new(),
            signature: None,
        }
    }

    pub fn with_content(name: Name, content: impl Into<Bytes>) -> Data {
        let mut data = Data::new(name);
        data.content = content.into();
        data
    }

    /// Uses the children of a Content element as this packet's content;
    /// any other element is embedded whole.
    pub fn set_content_block(&mut self, block: &Block) {
        if block.typ() == types::CONTENT {
            self.content = block.value_bytes();
        } else {
            self.content = block.encode();
        }
    }

    pub fn content_block(&self) -> Block {
        Block::new(types::CONTENT, self.content.clone())
    }

    fn meta_info(&self) -> Block {
        Block::nested(types::META_INFO, &[
            Block::from_u64(types::CONTENT_TYPE, self.content_type.code()),
        ])
    }

    /// Bytes covered by the signature: name, meta info, content and
    /// signature info.
    pub fn signed_portion(&self, info: &SignatureInfo) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.name.wire_encode().encode_into(&mut buf);
        self.meta_info().encode_into(&mut buf);
        self.content_block().encode_into(&mut buf);
        info.wire_encode(types::SIGNATURE_INFO).encode_into(&mut buf);
        buf.to_vec()
    }

    pub fn wire_encode(&self) -> Block {
        let mut elements = vec![
            self.name.wire_encode(),
            self.meta_info(),
            self.content_block(),
        ];
        if let Some(signature) = &self.signature {
            elements.push(signature.info.wire_encode(types::SIGNATURE_INFO));
            elements.push(Block::new(types::SIGNATURE_VALUE, signature.value.clone()));
        }
        Block::nested(types::DATA, &elements)
    }

    pub fn wire_decode(block: &Block) -> Result<Data, AbacError> {
        block.expect_type(types::DATA)?;
        let mut reader = block.reader()?;
        let name = Name::wire_decode(&reader.expect(types::NAME)?)?;
        let mut meta = reader.expect(types::META_INFO)?.reader()?;
        let content_type = ContentType::from_code(meta.expect(types::CONTENT_TYPE)?.to_u64()?)?;
        meta.finish()?;
        let content = reader.expect(types::CONTENT)?.value_bytes();
        let signature = match reader.optional(types::SIGNATURE_INFO) {
            Some(info) => Some(Signature {
                info: SignatureInfo::wire_decode(&info)?,
                value: reader.expect(types::SIGNATURE_VALUE)?.value_bytes(),
            }),
            None => None,
        };
        reader.finish()?;
        Ok(Data { name, content_type, content, signature })
    }

    pub fn to_wire(&self) -> Bytes {
        self.wire_encode().encode()
    }

    pub fn from_wire(wire: &[u8]) -> Result<Data, AbacError> {
        Data::wire_decode(&Block::decode(wire)?)
    }
}
