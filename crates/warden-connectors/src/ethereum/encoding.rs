//! Payloads Ethereum accounts sign.
//!
//! Everything here is pure: digests for EIP-191 messages, EIP-712 typed data,
//! Quorum private transactions and EEA private transactions, plus the signed
//! EEA encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ethers_core::types::Bytes;
use ethers_core::types::NameOrAddress;
use ethers_core::types::Signature;
use ethers_core::types::TransactionRequest;
use ethers_core::types::transaction::eip712::Eip712;
use ethers_core::types::transaction::eip712::TypedData;
use ethers_core::utils::rlp::RlpStream;
use serde::Deserialize;
use serde::Serialize;
use warden_core::keccak256;
use warden_errors::Error;
use warden_errors::Result;

const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Privacy restriction Besu and GoQuorum accept for EEA transactions.
pub const DEFAULT_PRIVATE_TYPE: &str = "restricted";

/// EIP-191 (version `0x45`) digest of `message`.
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut payload = format!("{EIP191_PREFIX}{}", message.len()).into_bytes();
    payload.extend_from_slice(message);
    keccak256(payload)
}

/// EIP-712 digest: `keccak256(0x19 0x01 || domainSeparator || structHash)`.
///
/// A primary type of `EIP712Domain` signs the domain alone, as wallets do.
pub fn typed_data_hash(typed_data: &TypedData) -> Result<[u8; 32]> {
    let domain_separator = typed_data
        .domain()
        .map_err(|e| Error::invalid_format(format!("invalid typed data domain: {e}")))?
        .separator();

    let mut payload = Vec::with_capacity(66);
    payload.extend_from_slice(&[0x19, 0x01]);
    payload.extend_from_slice(&domain_separator);
    if typed_data.primary_type != "EIP712Domain" {
        let struct_hash = typed_data
            .struct_hash()
            .map_err(|e| Error::invalid_format(format!("invalid typed data message: {e}")))?;
        payload.extend_from_slice(&struct_hash);
    }
    Ok(keccak256(payload))
}

/// Digest of a Quorum private transaction: the unsigned legacy payload
/// without chain id.
pub fn private_sighash(tx: &TransactionRequest) -> [u8; 32] {
    let mut unsigned = tx.clone();
    unsigned.chain_id = None;
    keccak256(unsigned.rlp())
}

/// Privacy fields of an EEA transaction. Enclave keys are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateArgs {
    pub private_from: String,
    #[serde(default)]
    pub private_for: Vec<String>,
    #[serde(default)]
    pub privacy_group_id: Option<String>,
    #[serde(default = "default_private_type")]
    pub private_type: String,
}

fn default_private_type() -> String {
    DEFAULT_PRIVATE_TYPE.to_string()
}

impl PrivateArgs {
    pub fn for_participants<I, S>(private_from: impl Into<String>, private_for: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            private_from: private_from.into(),
            private_for: private_for.into_iter().map(Into::into).collect(),
            privacy_group_id: None,
            private_type: default_private_type(),
        }
    }

    pub fn for_privacy_group(private_from: impl Into<String>, privacy_group_id: impl Into<String>) -> Self {
        Self {
            private_from: private_from.into(),
            private_for: Vec::new(),
            privacy_group_id: Some(privacy_group_id.into()),
            private_type: default_private_type(),
        }
    }

    fn decode(&self) -> Result<DecodedPrivateArgs> {
        let recipients = match (self.private_for.is_empty(), &self.privacy_group_id) {
            (false, None) => Recipients::Participants(
                self.private_for
                    .iter()
                    .map(|key| decode_key("privateFor", key))
                    .collect::<Result<_>>()?,
            ),
            (true, Some(group)) => Recipients::PrivacyGroup(decode_key("privacyGroupId", group)?),
            (false, Some(_)) => {
                return Err(Error::invalid_parameter("privateFor and privacyGroupId are mutually exclusive"));
            }
            (true, None) => {
                return Err(Error::invalid_parameter("one of privateFor or privacyGroupId is required"));
            }
        };

        Ok(DecodedPrivateArgs {
            private_from: decode_key("privateFrom", &self.private_from)?,
            recipients,
            private_type: self.private_type.clone(),
        })
    }
}

fn decode_key(field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::invalid_format(format!("{field} '{value}' is not valid base64: {e}")))
}

enum Recipients {
    Participants(Vec<Vec<u8>>),
    PrivacyGroup(Vec<u8>),
}

struct DecodedPrivateArgs {
    private_from: Vec<u8>,
    recipients: Recipients,
    private_type: String,
}

impl DecodedPrivateArgs {
    fn append_to(&self, stream: &mut RlpStream) {
        stream.append(&self.private_from);
        match &self.recipients {
            Recipients::Participants(keys) => {
                stream.begin_list(keys.len());
                for key in keys {
                    stream.append(key);
                }
            }
            Recipients::PrivacyGroup(group) => {
                stream.append(group);
            }
        }
        stream.append(&self.private_type);
    }
}

const EEA_FIELDS: usize = 12;

fn append_base_fields(stream: &mut RlpStream, tx: &TransactionRequest) -> Result<()> {
    stream.append(&tx.nonce.unwrap_or_default());
    stream.append(&tx.gas_price.unwrap_or_default());
    stream.append(&tx.gas.unwrap_or_default());
    match &tx.to {
        Some(NameOrAddress::Address(to)) => {
            stream.append(to);
        }
        Some(NameOrAddress::Name(name)) => {
            return Err(Error::invalid_parameter(format!("recipient '{name}' must be resolved to an address")));
        }
        None => {
            stream.append_empty_data();
        }
    }
    stream.append(&tx.value.unwrap_or_default());
    stream.append(&tx.data.as_ref().map(|data| data.to_vec()).unwrap_or_default());
    Ok(())
}

/// Digest signed for an EEA private transaction.
pub fn eea_payload_hash(tx: &TransactionRequest, chain_id: u64, args: &PrivateArgs) -> Result<[u8; 32]> {
    let private = args.decode()?;
    let mut stream = RlpStream::new_list(EEA_FIELDS);
    append_base_fields(&mut stream, tx)?;
    stream.append(&chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    private.append_to(&mut stream);
    Ok(keccak256(stream.out()))
}

/// Signed EEA transaction: `v`, `r`, `s` take the place of the chain id
/// fields.
pub fn encode_signed_eea(tx: &TransactionRequest, args: &PrivateArgs, signature: &Signature) -> Result<Bytes> {
    let private = args.decode()?;
    let mut stream = RlpStream::new_list(EEA_FIELDS);
    append_base_fields(&mut stream, tx)?;
    stream.append(&signature.v);
    stream.append(&signature.r);
    stream.append(&signature.s);
    private.append_to(&mut stream);
    Ok(stream.out().freeze().into())
}
