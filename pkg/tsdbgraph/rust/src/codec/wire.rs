// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Byte-level primitives of the model token: LEB128 varints and packed
//! flag words.

use super::CodecError;

#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub(crate) fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    /// Unsigned LEB128.
    pub(crate) fn varint(&mut self, mut v: u64) {
        loop {
            let low = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(low);
                return;
            }
            self.buf.push(low | 0x80);
        }
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn byte(&mut self) -> Result<u8, CodecError> {
        let (&first, rest) = self.data.split_first().ok_or(CodecError::Truncated)?;
        self.data = rest;
        Ok(first)
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.data.len() {
            return Err(CodecError::Truncated);
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    pub(crate) fn varint(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let b = self.byte()?;
            let low = u64::from(b & 0x7f);
            if shift >= 64 || (shift == 63 && low > 1) {
                return Err(CodecError::VarintOverflow);
            }
            value |= low << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len()
    }
}

/// Booleans packed least-significant bit first, written as one varint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flags {
    bits: u64,
    len: u32,
}

impl Flags {
    pub(crate) fn push(&mut self, bit: bool) {
        debug_assert!(self.len < 64, "flag word holds at most 64 bits");
        if bit {
            self.bits |= 1 << self.len;
        }
        self.len += 1;
    }

    pub(crate) fn bits(&self) -> u64 {
        self.bits
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self { bits, len: 0 }
    }

    /// Pops bits in push order. Reading past the stored bits yields `false`.
    pub(crate) fn next(&mut self) -> bool {
        let bit = self.len < 64 && self.bits & (1 << self.len) != 0;
        self.len = self.len.saturating_add(1);
        bit
    }
}
