//! WAV part merging.

use std::path::{Path, PathBuf};

use hound::{WavReader, WavWriter};

/// Concatenate WAV `parts` into `out`.  The first part's spec is used for
/// the output; later parts must share it.
pub fn merge_wav(parts: &[PathBuf], out: &Path) -> Result<(), hound::Error> {
    let Some(first) = parts.first() else {
        return Err(hound::Error::FormatError("no WAV parts to merge"));
    };
    let spec = WavReader::open(first)?.spec();
    let mut writer = WavWriter::create(out, spec)?;

    for part in parts {
        let mut reader = WavReader::open(part)?;
        if reader.spec() != spec {
            return Err(hound::Error::FormatError("WAV parts have different formats"));
        }
        match spec.sample_format {
            hound::SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            hound::SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }

    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavSpec;

    fn spec() -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_part(path: &Path, samples: &[i16]) {
        let mut writer = WavWriter::create(path, spec()).expect("create");
        for &s in samples {
            writer.write_sample(s).expect("write");
        }
        writer.finalize().expect("finalize");
    }

    #[test]
    fn parts_are_concatenated_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_part(&a, &[1, 2, 3]);
        write_part(&b, &[4, 5]);

        let out = dir.path().join("merged.wav");
        merge_wav(&[a, b], &out).expect("merge");

        let mut reader = WavReader::open(&out).expect("open");
        assert_eq!(reader.spec(), spec());
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn mismatched_formats_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_part(&a, &[1]);
        let stereo = WavSpec { channels: 2, ..spec() };
        let mut writer = WavWriter::create(&b, stereo).expect("create");
        writer.write_sample(0i16).expect("write");
        writer.write_sample(0i16).expect("write");
        writer.finalize().expect("finalize");

        assert!(merge_wav(&[a, b], &dir.path().join("out.wav")).is_err());
    }

    #[test]
    fn empty_part_list_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(merge_wav(&[], &dir.path().join("out.wav")).is_err());
    }
}
