use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Weekday
};
use regex::Regex;

pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// `MM/DD/YYYY`, the list view format.
pub fn format_short(
  date: NaiveDate
) -> String {
  date.format("%m/%d/%Y").to_string()
}

/// `DD Mon YYYY`, the detail view format.
pub fn format_long(
  date: NaiveDate
) -> String {
  date.format("%d %b %Y").to_string()
}

/// Parse a date as the gateway sends it:
/// `YYYY-MM-DD`, an RFC 3339 timestamp
/// (date part kept) or `MM/DD/YYYY`.
pub fn parse_wire_date(
  raw: &str
) -> Option<NaiveDate> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  if let Ok(ts) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(ts.date_naive());
  }

  if let Some(prefix) = token.get(..10)
    && token.as_bytes().get(10)
      == Some(&b'T')
    && let Ok(date) =
      NaiveDate::parse_from_str(
        prefix, "%Y-%m-%d"
      )
  {
    return Some(date);
  }

  NaiveDate::parse_from_str(
    token, "%m/%d/%Y"
  )
  .ok()
}

/// Parse a user-entered date: any wire
/// format plus `today`, `tomorrow`,
/// `yesterday`, weekday names (next
/// occurrence) and `+Nd` / `+Nw`
/// offsets.
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift(today, 1);
    }
    | "yesterday" => {
      return shift(today, -1);
    }
    | _ => {}
  }

  if let Some(date) =
    parse_wire_date(token)
  {
    return Ok(date);
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  let offset_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d{1,4})(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: {e}"
    )
  })?;

  if let Some(caps) =
    offset_re.captures(&lower)
  {
    let amount: i64 = caps["num"]
      .parse()
      .context("invalid date offset")?;
    let sign = if &caps["sign"] == "-" {
      -1
    } else {
      1
    };
    let days = match &caps["unit"] {
      | "w" => amount * 7,
      | _ => amount
    };
    return shift(today, sign * days);
  }

  Err(anyhow!(
    "unrecognized date: {token} \
     (expected YYYY-MM-DD, MM/DD/YYYY, \
     today, tomorrow, a weekday or +Nd)"
  ))
}

fn shift(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {date} \
         {days:+} days"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
