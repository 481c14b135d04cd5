use rust_htslib::bam::record::{Cigar, CigarString, CigarStringView};

/// Free functions for inspecting and rewriting `Cigar` elements, shared by
/// `CigarBuilder` and the sequence-container CIGAR-map construction.
pub struct CigarUtils {}

impl CigarUtils {
    pub fn cigar_consumes_read_bases(cig: &Cigar) -> bool {
        match cig {
            Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) | Cigar::Ins(_) | Cigar::SoftClip(_) => true,
            _ => false,
        }
    }

    pub fn cigar_consumes_reference_bases(cig: &Cigar) -> bool {
        match cig {
            Cigar::Match(_) | Cigar::Del(_) | Cigar::RefSkip(_) | Cigar::Equal(_) | Cigar::Diff(_) => true,
            _ => false,
        }
    }

    pub fn cigar_is_soft_clip(cig: &Cigar) -> bool {
        match cig {
            Cigar::SoftClip(_) => true,
            _ => false,
        }
    }

    pub fn is_clipping(cig: &Cigar) -> bool {
        match cig {
            Cigar::SoftClip(_) | Cigar::HardClip(_) => true,
            _ => false,
        }
    }

    /// Whether `element` could be merged into a run of `last` (same operator).
    pub fn cigar_elements_are_same_type(element: &Cigar, last: &Option<Cigar>) -> bool {
        match last {
            None => false,
            Some(last) => std::mem::discriminant(element) == std::mem::discriminant(last),
        }
    }

    /// Merge two same-type elements by summing their lengths, `None` if the
    /// operators differ.
    pub fn combine_cigar_operators(a: &Cigar, b: &Cigar) -> Option<Cigar> {
        if std::mem::discriminant(a) != std::mem::discriminant(b) {
            return None;
        }
        Some(Self::cigar_from_element_and_length(a, a.len() + b.len()))
    }

    /// Replace soft clips (S) with match (M) operators, merging the result
    /// via a `CigarBuilder`-style fold so consecutive identical operators
    /// collapse. e.g. 10S10M -> 20M.
    pub fn revert_soft_clips(cigar: &CigarStringView) -> CigarString {
        let mut elements: Vec<Cigar> = Vec::new();
        for element in cigar.iter() {
            let next = match element {
                Cigar::SoftClip(len) => Cigar::Match(*len),
                other => other.clone(),
            };
            match elements.last().copied() {
                Some(last) if std::mem::discriminant(&last) == std::mem::discriminant(&next) => {
                    let n = elements.len() - 1;
                    elements[n] = Self::cigar_from_element_and_length(&last, last.len() + next.len());
                }
                _ => elements.push(next),
            }
        }
        CigarString::from(elements)
    }

    /// Reference bases clipped away by the leading `num_clipped` read bases
    /// of `cigar`. Used when shifting an alignment start right to account
    /// for soft clips already applied to a synthetic read.
    pub fn alignment_start_shift(cigar: &CigarStringView, num_clipped: u32) -> u32 {
        let mut ref_bases_clipped = 0u32;
        let mut element_start = 0u32;
        for element in cigar.iter() {
            if let Cigar::HardClip(_) = element {
                continue;
            }
            let len = element.len();
            let element_end = element_start + if Self::cigar_consumes_read_bases(element) { len } else { 0 };

            if element_end <= num_clipped {
                ref_bases_clipped += if Self::cigar_consumes_reference_bases(element) { len } else { 0 };
            } else if element_start < num_clipped {
                let clipped_length = num_clipped - element_start;
                ref_bases_clipped += if Self::cigar_consumes_reference_bases(element) {
                    clipped_length
                } else {
                    0
                };
            }
            element_start = element_end;
        }
        ref_bases_clipped
    }

    pub fn cigar_from_element_and_length(cigar: &Cigar, length: u32) -> Cigar {
        match cigar {
            Cigar::Match(_) => Cigar::Match(length),
            Cigar::Ins(_) => Cigar::Ins(length),
            Cigar::Del(_) => Cigar::Del(length),
            Cigar::RefSkip(_) => Cigar::RefSkip(length),
            Cigar::SoftClip(_) => Cigar::SoftClip(length),
            Cigar::HardClip(_) => Cigar::HardClip(length),
            Cigar::Pad(_) => Cigar::Pad(length),
            Cigar::Equal(_) => Cigar::Equal(length),
            Cigar::Diff(_) => Cigar::Diff(length),
        }
    }

    /// Total consumed-read-base count across an entire cigar (M+I+S+=+X).
    /// Enforces the hard invariant that every per-read-start CIGAR in a
    /// SequenceContainer's cigar map consumes exactly `read_len` bases.
    pub fn read_length_from_cigar(cigar: &CigarStringView) -> u32 {
        cigar
            .iter()
            .filter(|c| Self::cigar_consumes_read_bases(c))
            .map(|c| c.len())
            .sum()
    }

    pub fn reference_length_from_cigar(cigar: &CigarStringView) -> u32 {
        cigar
            .iter()
            .filter(|c| Self::cigar_consumes_reference_bases(c))
            .map(|c| c.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_read_and_reference_bases() {
        assert!(CigarUtils::cigar_consumes_read_bases(&Cigar::Match(5)));
        assert!(CigarUtils::cigar_consumes_read_bases(&Cigar::Ins(5)));
        assert!(!CigarUtils::cigar_consumes_read_bases(&Cigar::Del(5)));

        assert!(CigarUtils::cigar_consumes_reference_bases(&Cigar::Match(5)));
        assert!(CigarUtils::cigar_consumes_reference_bases(&Cigar::Del(5)));
        assert!(!CigarUtils::cigar_consumes_reference_bases(&Cigar::Ins(5)));
    }

    #[test]
    fn combines_same_type_elements() {
        let combined = CigarUtils::combine_cigar_operators(&Cigar::Match(3), &Cigar::Match(4));
        assert_eq!(combined, Some(Cigar::Match(7)));
        assert_eq!(
            CigarUtils::combine_cigar_operators(&Cigar::Match(3), &Cigar::Ins(4)),
            None
        );
    }

    #[test]
    fn reverts_soft_clips_and_merges() {
        let cigar = CigarStringView::new(CigarString(vec![Cigar::SoftClip(10), Cigar::Match(10)]), 0);
        let reverted = CigarUtils::revert_soft_clips(&cigar);
        assert_eq!(reverted, CigarString(vec![Cigar::Match(20)]));
    }

    #[test]
    fn read_length_counts_match_and_insert_only() {
        let cigar = CigarStringView::new(
            CigarString(vec![Cigar::Match(80), Cigar::Ins(2), Cigar::Del(3), Cigar::Match(18)]),
            0,
        );
        assert_eq!(CigarUtils::read_length_from_cigar(&cigar), 100);
        assert_eq!(CigarUtils::reference_length_from_cigar(&cigar), 101);
    }
}
