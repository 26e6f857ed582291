// ===============================
// src/jalali.rs
// ===============================
//
// Epoch seconds -> wall clock at a fixed UTC offset, printed in the
// Solar Hijri (Jalali) calendar: "YYYY/MM/DD HH:MM:SS".
//
use chrono::{DateTime, Datelike, FixedOffset, Timelike};

pub const CONVERSION_FAILED: &str = "conversion failed";

/// Asia/Tehran has had no DST since 2022; +03:30 all year.
pub fn tehran() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600 + 30 * 60).expect("+03:30 is in range")
}

/// Parses "+03:30", "-05:00" or "0".
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s == "0" || s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => (1, s),
    };
    let (h, m) = rest.split_once(':').unwrap_or((rest, "0"));
    let h: i32 = h.parse().ok()?;
    let m: i32 = m.parse().ok()?;
    if !(0..=23).contains(&h) || !(0..=59).contains(&m) {
        return None;
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

/// Gregorian (y, m, d) -> Jalali (y, m, d). Valid for positive Gregorian years.
pub fn gregorian_to_jalali(gy: i64, gm: u32, gd: u32) -> (i64, u32, u32) {
    const G_D_M: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd as i64
        + G_D_M[(gm as usize).saturating_sub(1).min(11)];
    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }
    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };
    (jy, jm as u32, jd as u32)
}

/// Never panics; out-of-range input yields [`CONVERSION_FAILED`].
pub fn to_local_calendar_string(epoch_secs: i64, offset: FixedOffset) -> String {
    let Some(utc) = DateTime::from_timestamp(epoch_secs, 0) else {
        return CONVERSION_FAILED.to_string();
    };
    let local = utc.with_timezone(&offset);
    if local.year() < 1 {
        return CONVERSION_FAILED.to_string();
    }
    let (jy, jm, jd) = gregorian_to_jalali(local.year() as i64, local.month(), local.day());
    format!(
        "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
        jy,
        jm,
        jd,
        local.hour(),
        local.minute(),
        local.second()
    )
}
