//! 批量上传行程的 CSV 解析
//!
//! 列顺序：
//! `ewayBillNumber, pickup, destination, sender, receiver, transporter,
//!  loanAmount, loanInterestRate, maturityDays, distance, loadType, weight`
//!
//! 地点名里常带未转义的逗号（如 `Andheri, Mumbai`），导出工具会把一行撑成 14 列；
//! 这种行把 `[1]+[2]`、`[3]+[4]` 用 `", "` 合并回 12 列。

use crate::finance::{self, DEFAULT_MATURITY_DAYS};
use crate::protocol::CreateTripRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const COLUMN_COUNT: usize = 12;
const MIN_COLUMNS: usize = 9;
const SPLIT_LOCATION_COLUMNS: usize = 14;
const DEFAULT_LOAD_TYPE: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 文件中的行号，从 1 开始
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkParseReport {
    pub drafts: Vec<CreateTripRequest>,
    pub errors: Vec<RowError>,
    /// 数据行数 (不含表头与空行)
    #[serde(alias = "total_rows")]
    pub total_rows: usize,
}

impl BulkParseReport {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\u{201C}' | '\u{201D}')
}

/// 按逗号切分一行，引号内的逗号不切；字段去空白，
/// 直引号与弯引号都只切换引用状态，本身丢弃
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        if is_quote(c) {
            quoted = !quoted;
        } else if c == ',' && !quoted {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// 把原始行还原成 12 列，做不到时给出原因
fn normalize_columns(mut fields: Vec<String>) -> Result<Vec<String>, String> {
    match fields.len() {
        SPLIT_LOCATION_COLUMNS => {
            let pickup = format!("{}, {}", fields[1], fields[2]);
            let destination = format!("{}, {}", fields[3], fields[4]);
            let mut merged = Vec::with_capacity(COLUMN_COUNT);
            merged.push(std::mem::take(&mut fields[0]));
            merged.push(pickup);
            merged.push(destination);
            merged.extend(fields.drain(5..));
            Ok(merged)
        }
        n if (MIN_COLUMNS..=COLUMN_COUNT).contains(&n) => {
            fields.resize(COLUMN_COUNT, String::new());
            Ok(fields)
        }
        n => Err(format!(
            "Expected {} columns (or 14 with split locations), found {}",
            COLUMN_COUNT, n
        )),
    }
}

fn parse_decimal(raw: &str, column: &str) -> Result<Decimal, String> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '₹' | ',' | ' ')).collect();
    Decimal::from_str(&cleaned).map_err(|_| format!("{} is not a number: '{}'", column, raw))
}

fn optional_decimal(raw: &str, column: &str) -> Result<Decimal, String> {
    if raw.is_empty() {
        Ok(Decimal::ZERO)
    } else {
        parse_decimal(raw, column)
    }
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_row(fields: Vec<String>) -> Result<CreateTripRequest, String> {
    let f = normalize_columns(fields)?;

    let origin = f[1].clone();
    let destination = f[2].clone();
    if origin.is_empty() || destination.is_empty() {
        return Err("Pickup and destination are required".to_string());
    }

    let amount = parse_decimal(&f[6], "Loan amount")?;
    finance::validate_loan_amount(amount)?;

    let interest_rate = parse_decimal(&f[7], "Interest rate")?;
    finance::validate_interest_rate(interest_rate)?;

    let maturity_days = if f[8].is_empty() {
        DEFAULT_MATURITY_DAYS
    } else {
        match f[8].parse::<u32>() {
            Ok(d) if d > 0 => d,
            _ => return Err(format!("Maturity days must be a positive whole number: '{}'", f[8])),
        }
    };

    let distance = optional_decimal(&f[9], "Distance")?;
    let weight = optional_decimal(&f[11], "Weight")?;
    let load_type = non_empty(&f[10]).unwrap_or_else(|| DEFAULT_LOAD_TYPE.to_string());

    Ok(CreateTripRequest {
        origin,
        destination,
        sender: non_empty(&f[3]),
        receiver: non_empty(&f[4]),
        transporter: non_empty(&f[5]),
        eway_bill_number: non_empty(&f[0]),
        load_type,
        weight,
        distance,
        amount,
        interest_rate,
        maturity_days: Some(maturity_days),
        risk_level: None,
    })
}

/// 解析整个文件，第一条非空行是表头；
/// 坏行记入 `errors`，不中断整批
pub fn parse(text: &str) -> BulkParseReport {
    let mut report = BulkParseReport::default();
    let mut header_seen = false;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }

        report.total_rows += 1;
        match parse_row(split_line(line)) {
            Ok(draft) => report.drafts.push(draft),
            Err(reason) => report.errors.push(RowError {
                line: index + 1,
                reason,
            }),
        }
    }
    report
}

/// 模板下载用的表头行
pub fn template_header() -> &'static str {
    "ewayBillNumber,pickup,destination,sender,receiver,transporter,loanAmount,loanInterestRate,maturityDays,distance,loadType,weight"
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "ewayBillNumber,pickup,destination,sender,receiver,transporter,loanAmount,loanInterestRate,maturityDays,distance,loadType,weight";

    #[test]
    fn split_respects_quotes() {
        let fields = split_line(r#"EWB1, "Andheri, Mumbai" ,“Kothrud, Pune”,a"#);
        assert_eq!(fields, vec!["EWB1", "Andheri, Mumbai", "Kothrud, Pune", "a"]);
        assert_eq!(split_line("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn twelve_column_row() {
        let csv = format!(
            "{}\nEWB100,Mumbai,Pune,Acme,Globex,FastTrans,45000,12.5,30,150,Steel,12\n",
            HEADER
        );
        let report = parse(&csv);
        assert_eq!(report.total_rows, 1);
        assert!(report.errors.is_empty());
        let d = &report.drafts[0];
        assert_eq!(d.origin, "Mumbai");
        assert_eq!(d.destination, "Pune");
        assert_eq!(d.eway_bill_number.as_deref(), Some("EWB100"));
        assert_eq!(d.transporter.as_deref(), Some("FastTrans"));
        assert_eq!(d.amount, dec!(45000));
        assert_eq!(d.interest_rate, dec!(12.5));
        assert_eq!(d.maturity_days, Some(30));
        assert_eq!(d.distance, dec!(150));
        assert_eq!(d.load_type, "Steel");
        assert_eq!(d.weight, dec!(12));
    }

    #[test]
    fn nine_column_row_gets_defaults() {
        let csv = format!("{}\nEWB1,Delhi,Agra,S,R,T,30000,10,15\n", HEADER);
        let report = parse(&csv);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let d = &report.drafts[0];
        assert_eq!(d.distance, Decimal::ZERO);
        assert_eq!(d.weight, Decimal::ZERO);
        assert_eq!(d.load_type, "General");
        assert_eq!(d.maturity_days, Some(15));
    }

    #[test]
    fn fourteen_column_row_is_merged() {
        let csv = format!(
            "{}\nEWB7,Andheri,Mumbai,Kothrud,Pune,S,R,T,50000,11,20,160,Cement,20\n",
            HEADER
        );
        let report = parse(&csv);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let d = &report.drafts[0];
        assert_eq!(d.origin, "Andheri, Mumbai");
        assert_eq!(d.destination, "Kothrud, Pune");
        assert_eq!(d.sender.as_deref(), Some("S"));
        assert_eq!(d.amount, dec!(50000));
        assert_eq!(d.load_type, "Cement");
        assert_eq!(d.weight, dec!(20));
    }

    #[test]
    fn bad_rows_are_counted_and_skipped() {
        let csv = [
            HEADER,
            "EWB1,Mumbai,Pune,S,R,T,45000,12,30,150,Steel,12",
            "",
            "EWB2,Mumbai,Pune,S,R,T,19999,12,30,150,Steel,12",
            "EWB3,Mumbai,Pune,S,R,T,85000,12,30,150,Steel,12",
            "EWB4,Mumbai,Pune,S,R,T,40000,twelve,30,150,Steel,12",
            "EWB5,Mumbai,Pune,S,R,T",
            "EWB6,Surat,Vapi,S,R,T,\"25,000\",9,,80,Dyes,3",
        ]
        .join("\n");
        let report = parse(&csv);
        assert_eq!(report.total_rows, 6);
        assert_eq!(report.drafts.len(), 2);
        assert_eq!(report.error_count(), 4);
        let lines: Vec<usize> = report.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![4, 5, 6, 7]);
        assert_eq!(report.drafts[1].amount, dec!(25000));
        assert_eq!(report.drafts[1].maturity_days, Some(30));
    }

    #[test]
    fn header_only_is_empty() {
        let report = parse(&format!("\n\n{}\n\n", HEADER));
        assert_eq!(report.total_rows, 0);
        assert!(report.drafts.is_empty());
        assert_eq!(template_header(), HEADER);
    }
}
