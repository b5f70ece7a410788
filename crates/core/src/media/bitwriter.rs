//! Exp-Golomb bit writer for building parameter sets in tests.

pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    bit: u8,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit: 0,
        }
    }

    pub(crate) fn bits(&mut self, n: u32, value: u64) -> &mut Self {
        for i in (0..n).rev() {
            if self.bit == 0 {
                self.bytes.push(0);
            }
            let b = ((value >> i) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= b << (7 - self.bit);
            self.bit = (self.bit + 1) % 8;
        }
        self
    }

    pub(crate) fn flag(&mut self, value: bool) -> &mut Self {
        self.bits(1, value as u64)
    }

    pub(crate) fn ue(&mut self, value: u32) -> &mut Self {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        self.bits(len - 1, 0);
        self.bits(len, code)
    }

    /// Append the RBSP stop bit and return the escaped payload.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        self.bits(1, 1);
        let mut out = Vec::with_capacity(self.bytes.len());
        let mut zeros = 0usize;
        for &byte in &self.bytes {
            if zeros >= 2 && byte <= 0x03 {
                out.push(0x03);
                zeros = 0;
            }
            zeros = if byte == 0 { zeros + 1 } else { 0 };
            out.push(byte);
        }
        out
    }
}

mod tests {
    use h264_reader::rbsp::{BitRead, BitReader, decode_nal};

    use super::BitWriter;

    #[test]
    fn escaped_output_reads_back() {
        let mut w = BitWriter::new();
        w.bits(24, 0).ue(3).flag(true).bits(5, 17);
        let mut nalu = vec![0x67];
        nalu.extend_from_slice(&w.finish());
        assert_eq!(&nalu[1..5], &[0, 0, 0x03, 0]);

        let rbsp = decode_nal(&nalu).unwrap();
        let mut br = BitReader::new(&*rbsp);
        assert_eq!(br.read::<u32>(24, "zeros").unwrap(), 0);
        assert_eq!(br.read_ue("ue").unwrap(), 3);
        assert!(br.read_bool("flag").unwrap());
        assert_eq!(br.read::<u8>(5, "bits").unwrap(), 17);
        br.finish_rbsp().unwrap();
    }
}
