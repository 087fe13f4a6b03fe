//! # Transactions
//!
//! Bitcoin-style serialization: version, inputs, outputs, locktime, with an
//! optional segwit marker/flag and per-input witness stacks. The txid always
//! hashes the serialization without witness data.

use serde::{Deserialize, Serialize};
use shared_types::{double_sha256, Outpoint, TxHash};

use super::errors::CodecError;
use super::primitives::{ByteReader, ByteWriter};

/// Sequence value of an input that opts out of relative locktime.
pub const FINAL_SEQUENCE: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_out: Outpoint,
    pub script: Vec<u8>,
    pub sequence: u32,
    /// Empty for non-witness inputs.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn new(prev_out: Outpoint, script: Vec<u8>) -> Self {
        Self {
            prev_out,
            script,
            sequence: FINAL_SEQUENCE,
            witness: Vec::new(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_out.is_null()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    /// Read one transaction from the reader, leaving it positioned after it.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let version = reader.read_i32()?;

        // A zero input count followed by flag 0x01 marks a witness serialization.
        let mut segwit = false;
        if reader.peek_u8() == Some(0) {
            reader.read_u8()?;
            match reader.read_u8()? {
                0x01 => segwit = true,
                flag => return Err(CodecError::InvalidSegwitFlag(flag)),
            }
        }

        let input_count = reader.read_length()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024));
        for _ in 0..input_count {
            let tx_hash = reader.read_array::<32>()?;
            let nout = reader.read_u32()?;
            let script = reader.read_var_bytes()?.to_vec();
            let sequence = reader.read_u32()?;
            inputs.push(TxInput {
                prev_out: Outpoint::new(tx_hash, nout),
                script,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = reader.read_length()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024));
        for _ in 0..output_count {
            let value = reader.read_u64()?;
            let script = reader.read_var_bytes()?.to_vec();
            outputs.push(TxOutput { value, script });
        }

        if segwit {
            for input in &mut inputs {
                let items = reader.read_length()?;
                input.witness = (0..items)
                    .map(|_| reader.read_var_bytes().map(<[u8]>::to_vec))
                    .collect::<Result<_, _>>()?;
            }
        }

        let locktime = reader.read_u32()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
        })
    }

    /// Decode exactly one transaction; trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        reader.finish("transaction")?;
        Ok(tx)
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Full serialization, including witness data when present.
    pub fn encode(&self) -> Vec<u8> {
        self.serialize(self.has_witness())
    }

    /// Serialization hashed into the txid.
    pub fn encode_without_witness(&self) -> Vec<u8> {
        self.serialize(false)
    }

    fn serialize(&self, with_witness: bool) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(64 + 64 * self.inputs.len());
        writer.write_i32(self.version);
        if with_witness {
            writer.write_u8(0x00);
            writer.write_u8(0x01);
        }
        writer.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            writer.write_bytes(&input.prev_out.tx_hash);
            writer.write_u32(input.prev_out.nout);
            writer.write_var_bytes(&input.script);
            writer.write_u32(input.sequence);
        }
        writer.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            writer.write_u64(output.value);
            writer.write_var_bytes(&output.script);
        }
        if with_witness {
            for input in &self.inputs {
                writer.write_compact_size(input.witness.len() as u64);
                for item in &input.witness {
                    writer.write_var_bytes(item);
                }
            }
        }
        writer.write_u32(self.locktime);
        writer.into_bytes()
    }

    pub fn txid(&self) -> TxHash {
        double_sha256(&self.encode_without_witness())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }
}
