//! Demographic lookups: deprivation, ethnicity, practice registration.
use crate::{
    range::{Bands, Range},
    tables::{Address, Period, PracticeRegistration},
    ArcStr,
};

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;

/// The number of LSOAs in England, i.e. the largest IMD rank.
pub const IMD_MAX: i64 = 32844;

/// IMD ranks banded into quintiles. Rank 1 is the most deprived area.
///
/// The top band includes `IMD_MAX` itself.
pub static IMD_QUINTILES: Lazy<Bands<i64>> = Lazy::new(|| {
    let cut = |n: i64| IMD_MAX * n / 5;
    Bands::new(
        vec![
            (Range::new(0, Some(cut(1))), "1 (most deprived)"),
            (Range::new(cut(1), Some(cut(2))), "2"),
            (Range::new(cut(2), Some(cut(3))), "3"),
            (Range::new(cut(3), Some(cut(4))), "4"),
            (Range::new(cut(4), Some(IMD_MAX + 1)), "5 (least deprived)"),
        ],
        "unknown",
    )
});

/// Band an IMD rank into a quintile label. Negative, out of range and missing ranks are
/// "unknown".
pub fn imd_quintile(imd: Option<i64>) -> &'static str {
    IMD_QUINTILES.label(imd.as_ref())
}

/// The 6-group ethnicity categories, in order of the codelist's category column.
pub const ETHNICITY_GROUPS: [(&str, &str); 6] = [
    ("1", "White"),
    ("2", "Mixed"),
    ("3", "South Asian"),
    ("4", "Black"),
    ("5", "Other"),
    ("6", "Not stated"),
];

/// Recode a 6-group ethnicity category into its label.
pub fn ethnicity_label(category: Option<&str>) -> &'static str {
    category
        .and_then(|category| {
            ETHNICITY_GROUPS
                .iter()
                .find(|(key, _)| *key == category)
                .map(|(_, label)| *label)
        })
        .unwrap_or("Unknown")
}

/// Registration end dates on or after this are placeholders for "still registered".
pub fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(3000, 1, 1).unwrap()
}

/// Map far-future end dates (TPP records current registrations as ending 9999-12-31) to `None`.
pub fn real_end_date(date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.filter(|date| *date < far_future())
}

/// The period active on `date`.
///
/// When more than one is active we pick the one that started last, breaking ties by the one
/// that ends last (an open period ends last of all).
pub fn active_on<'a, T, I>(periods: I, date: NaiveDate) -> Option<&'a T>
where
    T: Period + 'a,
    I: IntoIterator<Item = &'a T>,
{
    periods
        .into_iter()
        .filter(|p| p.is_active_on(date))
        .max_by_key(|p| (p.start_date(), p.end_date().is_none(), p.end_date()))
}

/// The date the patient left their last practice, or `None` if they are still registered.
pub fn dereg_date<'a>(
    registrations: impl IntoIterator<Item = &'a PracticeRegistration>,
) -> Option<NaiveDate> {
    real_end_date(registrations.into_iter().filter_map(|r| r.end_date).max())
}

/// The latest registration end date strictly before `date`.
pub fn prior_dereg_date<'a>(
    registrations: impl IntoIterator<Item = &'a PracticeRegistration>,
    date: NaiveDate,
) -> Option<NaiveDate> {
    registrations
        .into_iter()
        .filter_map(|r| r.end_date)
        .filter(|end| *end < date)
        .max()
}

/// The latest (real) registration end date on or after `date`.
pub fn dereg_date_on_or_after<'a>(
    registrations: impl IntoIterator<Item = &'a PracticeRegistration>,
    date: NaiveDate,
) -> Option<NaiveDate> {
    registrations
        .into_iter()
        .filter_map(|r| real_end_date(r.end_date))
        .filter(|end| *end >= date)
        .max()
}

pub fn registered_on<'a>(
    registrations: impl IntoIterator<Item = &'a PracticeRegistration>,
    date: NaiveDate,
) -> bool {
    registrations.into_iter().any(|r| r.is_active_on(date))
}

/// The NUTS1 region of the practice the patient was registered with on `date`.
pub fn region_on<'a>(
    registrations: impl IntoIterator<Item = &'a PracticeRegistration>,
    date: NaiveDate,
) -> Option<ArcStr> {
    active_on(registrations, date).and_then(|r| r.practice_nuts1_region_name.clone())
}

/// The IMD rank of the patient's address on `date`.
pub fn imd_on<'a>(addresses: impl IntoIterator<Item = &'a Address>, date: NaiveDate) -> Option<i64> {
    active_on(addresses, date).and_then(|a| a.imd_rounded)
}

/// Shift a date by a whole number of years. 29 February becomes 1 March when the target year
/// isn't a leap year.
pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
        .unwrap_or(date)
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reg(start: NaiveDate, end: Option<NaiveDate>, region: &str) -> PracticeRegistration {
        PracticeRegistration {
            patient_id: 1,
            start_date: Some(start),
            end_date: end,
            practice_pseudo_id: None,
            practice_stp: None,
            practice_nuts1_region_name: Some(region.into()),
        }
    }

    #[test]
    fn imd_bands() {
        assert_eq!(imd_quintile(Some(0)), "1 (most deprived)");
        assert_eq!(imd_quintile(Some(6567)), "1 (most deprived)");
        assert_eq!(imd_quintile(Some(6568)), "2");
        assert_eq!(imd_quintile(Some(13137)), "3");
        assert_eq!(imd_quintile(Some(19706)), "4");
        assert_eq!(imd_quintile(Some(26275)), "5 (least deprived)");
        assert_eq!(imd_quintile(Some(32844)), "5 (least deprived)");
        assert_eq!(imd_quintile(Some(32845)), "unknown");
        assert_eq!(imd_quintile(Some(-1)), "unknown");
        assert_eq!(imd_quintile(None), "unknown");
    }

    #[test]
    fn ethnicity() {
        assert_eq!(ethnicity_label(Some("1")), "White");
        assert_eq!(ethnicity_label(Some("3")), "South Asian");
        assert_eq!(ethnicity_label(Some("6")), "Not stated");
        assert_eq!(ethnicity_label(Some("7")), "Unknown");
        assert_eq!(ethnicity_label(None), "Unknown");
    }

    #[test]
    fn dereg() {
        let current = [
            reg(date(2000, 1, 1), Some(date(2010, 1, 1)), "London"),
            reg(date(2010, 1, 1), Some(date(9999, 12, 31)), "East"),
        ];
        assert_eq!(dereg_date(&current), None);
        let left = [
            reg(date(2000, 1, 1), Some(date(2010, 1, 1)), "London"),
            reg(date(2010, 1, 1), Some(date(2021, 3, 4)), "East"),
        ];
        assert_eq!(dereg_date(&left), Some(date(2021, 3, 4)));
        assert_eq!(dereg_date(&[] as &[PracticeRegistration]), None);
        assert_eq!(real_end_date(Some(date(3000, 1, 1))), None);
        assert_eq!(real_end_date(Some(date(2999, 12, 31))), Some(date(2999, 12, 31)));

        assert_eq!(prior_dereg_date(&left, date(2021, 3, 4)), Some(date(2010, 1, 1)));
        assert_eq!(prior_dereg_date(&left, date(2010, 1, 1)), None);
        assert_eq!(dereg_date_on_or_after(&left, date(2021, 3, 4)), Some(date(2021, 3, 4)));
        assert_eq!(dereg_date_on_or_after(&current, date(2015, 1, 1)), None);
    }

    #[test]
    fn registration_on_date() {
        let regs = [
            reg(date(2000, 1, 1), None, "London"),
            reg(date(2015, 1, 1), Some(date(2016, 1, 1)), "East"),
        ];
        assert!(!registered_on(&regs, date(1999, 1, 1)));
        assert_eq!(region_on(&regs, date(2010, 1, 1)).as_deref(), Some("London"));
        // the later start wins
        assert_eq!(region_on(&regs, date(2015, 6, 1)).as_deref(), Some("East"));
        assert_eq!(region_on(&regs, date(2016, 1, 1)).as_deref(), Some("London"));

        let same_start = [
            reg(date(2000, 1, 1), Some(date(2020, 1, 1)), "London"),
            reg(date(2000, 1, 1), None, "East"),
        ];
        assert_eq!(region_on(&same_start, date(2010, 1, 1)).as_deref(), Some("East"));
    }

    #[test]
    fn shift_years() {
        assert_eq!(add_years(date(2021, 6, 1), -5), date(2016, 6, 1));
        assert_eq!(add_years(date(2020, 2, 29), 1), date(2021, 3, 1));
        assert_eq!(add_years(date(2020, 2, 29), -4), date(2016, 2, 29));
    }
}
