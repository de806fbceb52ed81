use gtfs_writer::encode;
use gtfs_writer::{ServiceDate, Time};

#[test]
fn unset_integers_become_empty_cells() {
    assert_eq!(encode::opt_u32(None), "");
    assert_eq!(encode::opt_u32(Some(0)), "0");
    assert_eq!(encode::opt_i32(Some(-3)), "-3");
    assert_eq!(encode::nonzero_i32(0), "");
    assert_eq!(encode::nonzero_i32(-2), "-2");
}

#[test]
fn floats_use_shortest_roundtrip_form() {
    assert_eq!(encode::opt_f32(Some(47.5)), "47.5");
    assert_eq!(encode::opt_f32(Some(1.0)), "1");
    assert_eq!(encode::opt_f32(None), "");
    assert_eq!(encode::nonzero_f32(0.0), "");
    assert_eq!(encode::nonzero_f32(0.25), "0.25");
}

#[test]
fn gtfs_bool_has_tristate_and_binary_forms() {
    assert_eq!(encode::gtfs_bool(true, true), "1");
    assert_eq!(encode::gtfs_bool(false, true), "0");
    assert_eq!(encode::gtfs_bool(true, false), "1");
    assert_eq!(encode::gtfs_bool(false, false), "");
}

#[test]
fn dates_are_eight_digit_numerals() {
    assert_eq!(encode::opt_date(Some(ServiceDate::new(2024, 3, 7))), "20240307");
    // Years below 1000 still pad out to eight digits.
    assert_eq!(encode::opt_date(Some(ServiceDate::new(800, 1, 1))), "08000101");
    assert_eq!(encode::opt_date(None), "");
}

#[test]
fn times_are_zero_padded_and_allow_hours_past_24() {
    assert_eq!(encode::time(Time::new(8, 5, 0)), "08:05:00");
    assert_eq!(encode::time(Time::new(26, 30, 9)), "26:30:09");
}

#[test]
fn sanitize_collapses_newlines() {
    assert_eq!(encode::sanitize("Main St\nPlatform 2"), "Main St Platform 2");
    assert_eq!(encode::sanitize("no newline"), "no newline");
}
