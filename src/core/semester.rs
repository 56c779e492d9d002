// src/core/semester.rs
//! Term identifiers.
//!
//! The intranet names a term `YYYYn` (`"20221"` = first semester of 2022);
//! the LMS splits it into a `year` and a two-digit `semester` query value
//! (`"2022"`, `"10"`). Only the last part needs a table:
//!
//! | intranet | lms | term            |
//! |----------|-----|-----------------|
//! | `1`      | `10`| 1st semester    |
//! | `2`      | `20`| 2nd semester    |
//! | `3`      | `11`| summer session  |
//! | `4`      | `21`| winter session  |
//!
//! Codes outside the table never map to a guessed default.

use serde::{Deserialize, Serialize};

/// Terms a page lets the user choose from, and the one it currently shows.
///
/// Always read from the page that was just loaded; the server decides what
/// is selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterData {
    pub selected: String,
    pub selectable: Vec<String>,
}

/// Which column of the table a code comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemesterStyle {
    Intranet,
    Lms,
}

/// LMS query pair for one term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmsSemester {
    pub year: String,
    pub semester: String,
}

pub struct SemesterConverter;

impl SemesterConverter {
    const TABLE: [(&'static str, &'static str); 4] = [
        ("1", "10"),
        ("2", "20"),
        ("3", "11"),
        ("4", "21"),
    ];

    /// Map a term code written in `from` style to the other style.
    pub fn convert(code: &str, from: SemesterStyle) -> Option<&'static str> {
        Self::TABLE.iter().find_map(|&(intranet, lms)| match from {
            SemesterStyle::Intranet if intranet == code => Some(lms),
            SemesterStyle::Lms if lms == code => Some(intranet),
            _ => None,
        })
    }

    /// `"20221"` → `{ year: "2022", semester: "10" }`.
    pub fn intranet_to_lms(code: &str) -> Option<LmsSemester> {
        let year = code.get(..4)?;
        let term = code.get(4..)?;
        Some(LmsSemester {
            year: s!(year),
            semester: s!(Self::convert(term, SemesterStyle::Intranet)?),
        })
    }

    /// `("2022", "10")` → `"20221"`.
    pub fn lms_to_intranet(year: &str, semester: &str) -> Option<String> {
        Some(join!(year, Self::convert(semester, SemesterStyle::Lms)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_codes_round_trip() {
        for code in ["1", "2", "3", "4"] {
            let lms = SemesterConverter::convert(code, SemesterStyle::Intranet).unwrap();
            assert_eq!(SemesterConverter::convert(lms, SemesterStyle::Lms), Some(code));
        }
        assert_eq!(SemesterConverter::convert("1", SemesterStyle::Intranet), Some("10"));
    }

    #[test]
    fn unmapped_codes_yield_nothing() {
        assert_eq!(SemesterConverter::convert("5", SemesterStyle::Intranet), None);
        assert_eq!(SemesterConverter::convert("1", SemesterStyle::Lms), None);
        assert_eq!(SemesterConverter::intranet_to_lms("20229"), None);
        assert_eq!(SemesterConverter::intranet_to_lms("202"), None);
        assert_eq!(SemesterConverter::lms_to_intranet("2022", "30"), None);
    }

    #[test]
    fn full_term_codes() {
        let lms = SemesterConverter::intranet_to_lms("20223").unwrap();
        assert_eq!(lms, LmsSemester { year: s!("2022"), semester: s!("11") });
        assert_eq!(
            SemesterConverter::lms_to_intranet(&lms.year, &lms.semester).as_deref(),
            Some("20223")
        );
    }
}
