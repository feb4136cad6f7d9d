//! Async message framing over tokio streams
//!
//! An LDAP connection carries back-to-back `LDAPMessage` TLVs with no
//! extra framing. [`read_message`] reads exactly one of them, so the
//! stream stays positioned at the start of the next message.

use crate::message::LdapMessage;
use ldap_asn1::ber::decoder::check_length;
use ldap_asn1::ber::{DecoderOptions, Identifier, Length};
use ldap_core::{LdapError, LdapResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

async fn read_octet<R: AsyncRead + Unpin>(reader: &mut R, context: &str) -> LdapResult<u8> {
    reader
        .read_u8()
        .await
        .map_err(|e| LdapError::from_read(e, context))
}

/// Read the raw octets of one complete TLV
pub async fn read_tlv<R: AsyncRead + Unpin>(
    reader: &mut R,
    options: &DecoderOptions,
) -> LdapResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(16);

    let first = read_octet(reader, "identifier").await?;
    raw.push(first);
    if first & 0x1F == 0x1F {
        loop {
            let octet = read_octet(reader, "identifier").await?;
            raw.push(octet);
            if octet & 0x80 == 0 {
                break;
            }
        }
    }
    let (_, id_len) = Identifier::decode(&raw)?;

    let first_len = read_octet(reader, "length").await?;
    raw.push(first_len);
    // indefinite, reserved and oversized forms are rejected by Length::decode
    if first_len & 0x80 != 0 && first_len != 0x80 && first_len != 0xFF {
        let count = (first_len & 0x7F) as usize;
        if count <= 4 {
            let mut octets = [0u8; 4];
            reader
                .read_exact(&mut octets[..count])
                .await
                .map_err(|e| LdapError::from_read(e, "length"))?;
            raw.extend_from_slice(&octets[..count]);
        }
    }
    let (length, _) = Length::decode(&raw[id_len..])?;
    let content_len = length.definite()?;
    check_length(content_len, options)?;

    let header_len = raw.len();
    raw.resize(header_len + content_len, 0);
    reader
        .read_exact(&mut raw[header_len..])
        .await
        .map_err(|e| LdapError::from_read(e, "content"))?;
    Ok(raw)
}

/// Read and decode the next message from the stream
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
    options: DecoderOptions,
) -> LdapResult<LdapMessage> {
    let raw = read_tlv(reader, &options).await?;
    log::trace!("read {} octet message", raw.len());
    Ok(LdapMessage::decode_with(&raw, options)?.0)
}

/// Encode `message`, write it and flush the stream
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &LdapMessage,
) -> LdapResult<()> {
    let bytes = message.encode();
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    log::trace!("wrote message {} ({} octets)", message.message_id, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol_op::ProtocolOp;
    use crate::request::DelRequest;
    use crate::result::OperationResult;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_message_split_across_reads() {
        let message = LdapMessage::new(4, ProtocolOp::DelRequest(DelRequest::new("cn=a,dc=x")));
        let bytes = message.encode();
        let (head, tail) = bytes.split_at(3);
        let mut stream = Builder::new().read(head).read(tail).build();

        let decoded = read_message(&mut stream, DecoderOptions::default()).await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_read_two_messages() {
        let first = LdapMessage::new(1, ProtocolOp::UnbindRequest);
        let second = LdapMessage::new(2, ProtocolOp::AbandonRequest(1));
        let mut bytes = first.encode();
        bytes.extend(second.encode());
        let mut stream = Builder::new().read(&bytes).build();

        let options = DecoderOptions::default();
        assert_eq!(read_message(&mut stream, options).await.unwrap(), first);
        assert_eq!(read_message(&mut stream, options).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_stream_ends_mid_message() {
        let bytes = LdapMessage::new(1, ProtocolOp::UnbindRequest).encode();
        let mut stream = Builder::new().read(&bytes[..bytes.len() - 1]).build();
        assert!(matches!(
            read_message(&mut stream, DecoderOptions::default()).await,
            Err(LdapError::TruncatedStream(_))
        ));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let mut stream = Builder::new().read(&[0x30, 0x84, 0x01, 0x00, 0x00, 0x00]).build();
        let options = DecoderOptions::default().with_max_length(1024);
        assert!(matches!(
            read_message(&mut stream, options).await,
            Err(LdapError::MalformedStructure(_))
        ));
    }

    #[tokio::test]
    async fn test_indefinite_length_rejected() {
        let mut stream = Builder::new().read(&[0x30, 0x80]).build();
        assert!(matches!(
            read_message(&mut stream, DecoderOptions::default()).await,
            Err(LdapError::UnsupportedLengthForm(_))
        ));
    }

    #[tokio::test]
    async fn test_write_message() {
        let message = LdapMessage::new(5, ProtocolOp::DelResponse(OperationResult::success()));
        let mut stream = Builder::new().write(&message.encode()).build();
        write_message(&mut stream, &message).await.unwrap();
    }
}
