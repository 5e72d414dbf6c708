use base64::Engine;

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Encodes little-endian PCM16 samples as base64, the form audio chunks travel in.
pub fn encode_pcm16(pcm16: &[i16]) -> String {
    let pcm16_bytes: Vec<u8> = pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16_bytes)
}

/// Encodes f32 samples in [-1.0, 1.0] as base64 PCM16.
pub fn encode_f32(pcm32: &[f32]) -> String {
    encode_pcm16(&convert_f32_to_i16(pcm32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_f32_to_i16() {
        let samples = convert_f32_to_i16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_encode_pcm16() {
        // 16384 = 0x4000, little endian [0x00, 0x40]
        let encoded = encode_pcm16(&[16384]);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0x40]);
        assert_eq!(encode_pcm16(&[]), "");
    }

    #[test]
    fn test_encode_f32_matches_pcm16() {
        let pcm32 = [0.5, -0.25];
        assert_eq!(encode_f32(&pcm32), encode_pcm16(&convert_f32_to_i16(&pcm32)));
    }
}
