use std::fmt;

/// A chromosome that peaks can be bucketed into. Anything else (contigs,
/// mitochondria, patches) has no bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chromosome {
    Autosome(u32),
    X,
    Y,
}

impl Chromosome {
    /// All buckets for an organism, in file order: 1..=max_chr, X, Y
    pub fn all(max_chr: u32) -> impl Iterator<Item = Chromosome> {
        (1..=max_chr)
            .map(Chromosome::Autosome)
            .chain([Chromosome::X, Chromosome::Y])
    }

    /// Position of this chromosome in the list returned by `all`
    pub fn slot(&self, max_chr: u32) -> usize {
        match self {
            Chromosome::Autosome(c) => (*c - 1) as usize,
            Chromosome::X => max_chr as usize,
            Chromosome::Y => max_chr as usize + 1,
        }
    }

    /// Classify a raw label, with or without a leading "chr"
    pub fn from_label(label: &str, max_chr: u32) -> Option<Chromosome> {
        Chromosome::from_label_bytes(label.as_bytes(), max_chr)
    }

    pub fn from_label_bytes(label: &[u8], max_chr: u32) -> Option<Chromosome> {
        let label = label.strip_prefix(b"chr").unwrap_or(label);
        match label {
            b"X" => Some(Chromosome::X),
            b"Y" => Some(Chromosome::Y),
            _ => {
                if label.is_empty() || !label.iter().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let c: u32 = std::str::from_utf8(label).ok()?.parse().ok()?;
                if c >= 1 && c <= max_chr {
                    Some(Chromosome::Autosome(c))
                } else {
                    None
                }
            }
        }
    }

    /// Classify a peak record. The chromosome is the part of the first
    /// tab-separated field before the first '_', which covers both the
    /// "chr1_100_200" identifier form and the BED form
    pub fn from_record(record: &str, max_chr: u32) -> Option<Chromosome> {
        Chromosome::from_record_bytes(record.as_bytes(), max_chr)
    }

    /// As `from_record`, on raw bytes. Records need not be UTF-8, and a
    /// trailing line ending is ignored
    pub fn from_record_bytes(record: &[u8], max_chr: u32) -> Option<Chromosome> {
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        let record = record.strip_suffix(b"\r").unwrap_or(record);
        let first_field = record.split(|&b| b == b'\t').next().unwrap_or_default();
        let label = first_field.split(|&b| b == b'_').next().unwrap_or_default();
        Chromosome::from_label_bytes(label, max_chr)
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(c) => write!(f, "{}", c),
            Chromosome::X => write!(f, "X"),
            Chromosome::Y => write!(f, "Y"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_slots_agree() {
        for max_chr in [19, 22] {
            let all: Vec<Chromosome> = Chromosome::all(max_chr).collect();
            assert_eq!(all.len(), max_chr as usize + 2);
            for (i, c) in all.iter().enumerate() {
                assert_eq!(c.slot(max_chr), i);
            }
        }
    }

    #[test]
    fn test_from_record() {
        assert_eq!(Chromosome::from_record("chr7_1000_2000\t5", 22), Some(Chromosome::Autosome(7)));
        assert_eq!(Chromosome::from_record("chrX_500_900", 19), Some(Chromosome::X));
        assert_eq!(Chromosome::from_record("Y_1_2", 22), Some(Chromosome::Y));
        assert_eq!(Chromosome::from_record("chr3\t10\t20", 22), Some(Chromosome::Autosome(3)));
        assert_eq!(Chromosome::from_record("12_10_20", 22), Some(Chromosome::Autosome(12)));
    }

    #[test]
    fn test_unrecognised_labels_are_dropped() {
        assert_eq!(Chromosome::from_record("chrZ_1_2", 22), None);
        assert_eq!(Chromosome::from_record("chrM_1_2", 22), None);
        assert_eq!(Chromosome::from_record("chr0_1_2", 22), None);
        assert_eq!(Chromosome::from_record("chr20_1_2", 19), None);
        assert_eq!(Chromosome::from_record("chrUn_gl000220_1_2", 22), None);
        assert_eq!(Chromosome::from_record("chr-1_1_2", 22), None);
        assert_eq!(Chromosome::from_record("", 22), None);
        assert_eq!(Chromosome::from_record("chr99999999999999999999_1_2", 22), None);
    }

    #[test]
    fn test_from_record_bytes() {
        assert_eq!(Chromosome::from_record_bytes(b"chr7_1_2\r\n", 22), Some(Chromosome::Autosome(7)));
        assert_eq!(Chromosome::from_record_bytes(b"chrX\t1\t2\n", 22), Some(Chromosome::X));
        assert_eq!(Chromosome::from_record_bytes(b"chrX\r\n", 22), Some(Chromosome::X));
        assert_eq!(Chromosome::from_record_bytes(b"chrUn\xff_1_2\n", 22), None);
        assert_eq!(Chromosome::from_record_bytes(b"chr\xff7_1_2", 22), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Chromosome::Autosome(7).to_string(), "7");
        assert_eq!(Chromosome::X.to_string(), "X");
    }
}
