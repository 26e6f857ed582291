// ===============================
// src/format.rs (Telegram message rendering)
// ===============================
use chrono::FixedOffset;

use crate::aggregate::AggregationError;
use crate::domain::{Ticket, TradeSummary};
use crate::jalali::to_local_calendar_string;

pub const PLACEHOLDER: &str = "N/A";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const MARK_PROFIT: &str = "🟢";
const MARK_LOSS: &str = "🔴";

/// Grouping and decimal symbols for money amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLocale {
    pub group_sep: String,
    pub decimal_sep: String,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self { group_sep: ".".into(), decimal_sep: ",".into() }
    }
}

/// Everything the renderer needs besides the summary itself.
#[derive(Debug, Clone)]
pub struct FormatCtx {
    pub currency: String,
    pub locale: NumberLocale,
    pub offset: FixedOffset,
}

/// `{CUR}+1.234,50` / `{CUR}-100,00`. Explicit `+` for zero and gains.
pub fn format_money(value: f64, currency: &str, locale: &NumberLocale) -> String {
    if !value.is_finite() {
        return format!("{currency}{PLACEHOLDER}");
    }
    let sign = if value >= 0.0 { "+" } else { "-" };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 * locale.group_sep.len());
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(&locale.group_sep);
        }
        grouped.push(ch);
    }
    format!("{currency}{sign}{grouped}{}{frac_part}", locale.decimal_sep)
}

/// `H:MM:SS`, prefixed with `N day(s), ` past 24h. Negative -> placeholder.
pub fn format_duration(secs: i64) -> String {
    if secs < 0 {
        return PLACEHOLDER.to_string();
    }
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        n => format!("{n} days, {hms}"),
    }
}

fn rounded(value: f64, places: i32) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let f = 10f64.powi(places);
    let r = (value * f).round() / f;
    // avoid "-0"
    if r == 0.0 { "0".to_string() } else { r.to_string() }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn or_placeholder(s: &str) -> String {
    if s.trim().is_empty() { PLACEHOLDER.to_string() } else { escape_html(s.trim()) }
}

/// Drops tags and undoes [`escape_html`], for channels without HTML parsing.
pub fn to_plain(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

pub fn format_summary(s: &TradeSummary, ctx: &FormatCtx) -> String {
    let open_time = to_local_calendar_string(s.first_open.time, ctx.offset);
    let close_time = to_local_calendar_string(s.last_close.time, ctx.offset);
    let marker = if s.total_profit >= 0.0 { MARK_PROFIT } else { MARK_LOSS };
    let profit = format_money(s.total_profit, &escape_html(&ctx.currency), &ctx.locale);

    format!(
        "📊 <b>گزارش معامله بسته شده</b> 📊\n\
         {RULE}\n\n\
         📅 <b>تاریخ شروع:</b> <i>{open_time}</i>\n\
         📅 <b>تاریخ پایان:</b> <i>{close_time}</i>\n\
         ⏱️ <b>مدت زمان:</b> <code>{duration}</code>\n\n\
         💹 <b>قیمت ورود:</b> <code>{open_px}</code>\n\
         💹 <b>قیمت خروج:</b> <code>{close_px}</code>\n\
         📈 <b>نماد:</b> <i>{symbol}</i>\n\n\
         🎫 <i>تیکت:</i> <code>{ticket}</code>\n\
         📦 <b>حجم:</b> <code>{volume}</code>\n\n\
         💰 <b>سود/زیان:</b>\n\
         {marker} <code><b>{profit}</b></code>\n\n\
         {RULE}\n",
        duration = format_duration(s.duration_secs()),
        open_px = rounded(s.first_open.price, 5),
        close_px = rounded(s.last_close.price, 5),
        symbol = or_placeholder(&s.symbol),
        ticket = s.ticket,
        volume = rounded(s.total_volume, 2),
    )
}

pub fn format_error(ticket: Ticket, err: &AggregationError) -> String {
    match err {
        AggregationError::NoHistory(_) => {
            format!("⚠️ معامله با تیکت <code>{ticket}</code> بسته شد، اما اطلاعات آن در تاریخچه یافت نشد.")
        }
        AggregationError::MalformedPosition(_) => {
            format!("⚠️ خطا در پردازش معاملات پوزیشن <code>{ticket}</code>: معاملات ورودی یا خروجی یافت نشد.")
        }
    }
}
