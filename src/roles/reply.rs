use tracing::{error, warn};
use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;
use crate::ndn::{name::Name, packet::{ContentType, Data}};
use crate::security::KeyChain;

pub(crate) const SUCCESS: u64 = 200;

/// `Content{ StatusCode, StatusText }`
pub(crate) fn status_block(code: u64, text: &str) -> Block {
    Block::nested(types::CONTENT, &[
        Block::from_u64(types::STATUS_CODE, code),
        Block::from_text(types::STATUS_TEXT, text),
    ])
}

/// Signed answer to the Interest `name`: `result`'s content on success, a
/// NACK carrying the error's status otherwise. `None` only if signing fails.
pub(crate) fn answer(
    keychain: &KeyChain,
    identity: &Name,
    name: &Name,
    result: Result<Block, AbacError>,
) -> Option<Data> {
    let mut data = Data::new(name.clone());
    match result {
        Ok(block) => data.set_content_block(&block),
        Err(rejection) => {
            warn!(name = %name, %rejection, "rejecting request");
            data.content_type = ContentType::Nack;
            data.set_content_block(&status_block(rejection.status_code(), rejection.reason()));
        }
    }
    match keychain.sign_data(&mut data, identity) {
        Ok(()) => Some(data),
        Err(failure) => {
            error!(name = %name, %failure, "cannot sign reply");
            None
        }
    }
}

/// Turns a received NACK Data back into the error it reports.
pub fn into_result(data: Data) -> Result<Data, AbacError> {
    if data.content_type != ContentType::Nack {
        return Ok(data);
    }
    let mut reader = data.content_block().reader()?;
    let code = reader.expect(types::STATUS_CODE)?.to_u64()?;
    let text = reader.expect(types::STATUS_TEXT)?.to_text()?;
    reader.finish()?;
    Err(AbacError::from_status(code, text))
}
