use chrono::{NaiveDate, NaiveDateTime};
use conto_core::Statement;
use std::fmt::Write;

const HEADER: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:UTF-8
CHARSET:NONE
COMPRESSION:NONE
OLDFILEUID:NONE
NEWFILEUID:NONE
";

/// Render a statement as an OFX 1.02 (SGML) bank statement response.
pub fn render(statement: &Statement, generated_at: NaiveDateTime) -> String {
    let mut w = OfxWriter::default();
    w.out.push_str(HEADER);
    w.out.push('\n');

    w.open("OFX");
    w.open("SIGNONMSGSRSV1");
    w.open("SONRS");
    w.status();
    w.tag("DTSERVER", &generated_at.format("%Y%m%d%H%M%S").to_string());
    w.tag("LANGUAGE", "ENG");
    w.close("SONRS");
    w.close("SIGNONMSGSRSV1");

    w.open("BANKMSGSRSV1");
    w.open("STMTTRNRS");
    w.tag("TRNUID", "0");
    w.status();
    w.open("STMTRS");
    w.tag("CURDEF", &statement.currency);

    w.open("BANKACCTFROM");
    w.tag("BANKID", &statement.bank_id);
    w.tag("ACCTID", &statement.account_id);
    w.tag("ACCTTYPE", &statement.account_type.to_string());
    w.close("BANKACCTFROM");

    let (start, end) = statement
        .date_span()
        .unwrap_or((generated_at.date(), generated_at.date()));
    w.open("BANKTRANLIST");
    w.tag("DTSTART", &ofx_date(start));
    w.tag("DTEND", &ofx_date(end));
    for tx in &statement.transactions {
        w.open("STMTTRN");
        w.tag("TRNTYPE", &tx.direction.to_string());
        w.tag("DTPOSTED", &ofx_date(tx.date));
        w.tag("TRNAMT", &tx.amount.to_string());
        w.tag("FITID", &tx.id);
        if let Some(payee) = tx.payee.as_deref().filter(|p| !p.is_empty()) {
            w.tag("NAME", payee);
        }
        if !tx.memo.is_empty() {
            w.tag("MEMO", &tx.memo);
        }
        w.close("STMTTRN");
    }
    w.close("BANKTRANLIST");

    w.close("STMTRS");
    w.close("STMTTRNRS");
    w.close("BANKMSGSRSV1");
    w.close("OFX");
    w.out
}

#[derive(Default)]
struct OfxWriter {
    out: String,
}

impl OfxWriter {
    fn open(&mut self, name: &str) {
        let _ = writeln!(self.out, "<{name}>");
    }

    fn close(&mut self, name: &str) {
        let _ = writeln!(self.out, "</{name}>");
    }

    fn tag(&mut self, name: &str, value: &str) {
        let _ = writeln!(self.out, "<{name}>{}", escape(value));
    }

    fn status(&mut self) {
        self.open("STATUS");
        self.tag("CODE", "0");
        self.tag("SEVERITY", "INFO");
        self.close("STATUS");
    }
}

fn ofx_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// SGML element content: markup characters escaped, line breaks flattened.
fn escape(value: &str) -> String {
    value
        .trim()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conto_core::{AccountType, CanonicalTransaction, Money};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn generated() -> NaiveDateTime {
        date(2022, 4, 1).and_hms_opt(9, 30, 0).unwrap()
    }

    fn sample() -> Statement {
        Statement {
            bank_id: "Fineco".to_string(),
            currency: "EUR".to_string(),
            account_id: "1234567".to_string(),
            account_type: AccountType::Checking,
            transactions: vec![
                CanonicalTransaction::new(
                    date(2022, 3, 15),
                    Money::from_cents(-4250),
                    None,
                    String::new(),
                ),
                CanonicalTransaction::new(
                    date(2022, 3, 1),
                    Money::from_cents(150000),
                    Some("Salary".to_string()),
                    "Monthly salary & bonus".to_string(),
                ),
            ],
        }
    }

    /// Values of every `<TAG>value` line, in document order.
    fn values<'a>(ofx: &'a str, tag: &str) -> Vec<&'a str> {
        let prefix = format!("<{tag}>");
        ofx.lines().filter_map(|l| l.strip_prefix(prefix.as_str())).collect()
    }

    #[test]
    fn header_and_account_block() {
        let ofx = render(&sample(), generated());
        assert!(ofx.starts_with("OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\n"));
        assert_eq!(values(&ofx, "CURDEF"), vec!["EUR"]);
        assert_eq!(values(&ofx, "BANKID"), vec!["Fineco"]);
        assert_eq!(values(&ofx, "ACCTID"), vec!["1234567"]);
        assert_eq!(values(&ofx, "ACCTTYPE"), vec!["CHECKING"]);
        assert_eq!(values(&ofx, "DTSERVER"), vec!["20220401093000"]);
    }

    #[test]
    fn date_span_drives_start_and_end() {
        let ofx = render(&sample(), generated());
        assert_eq!(values(&ofx, "DTSTART"), vec!["20220301"]);
        assert_eq!(values(&ofx, "DTEND"), vec!["20220315"]);
    }

    #[test]
    fn transactions_in_statement_order() {
        let stmt = sample();
        let ofx = render(&stmt, generated());
        assert_eq!(values(&ofx, "TRNTYPE"), vec!["DEBIT", "CREDIT"]);
        assert_eq!(values(&ofx, "TRNAMT"), vec!["-42.50", "1500.00"]);
        assert_eq!(values(&ofx, "DTPOSTED"), vec!["20220315", "20220301"]);
        assert_eq!(
            values(&ofx, "FITID"),
            vec![stmt.transactions[0].id.as_str(), stmt.transactions[1].id.as_str()]
        );
    }

    #[test]
    fn empty_payee_and_memo_are_omitted() {
        let ofx = render(&sample(), generated());
        assert_eq!(values(&ofx, "NAME"), vec!["Salary"]);
        assert_eq!(values(&ofx, "MEMO"), vec!["Monthly salary &amp; bonus"]);
    }

    #[test]
    fn tags_are_balanced() {
        let ofx = render(&sample(), generated());
        for tag in ["OFX", "STMTRS", "BANKTRANLIST", "STMTTRN", "STATUS"] {
            let opens = ofx.lines().filter(|l| *l == format!("<{tag}>")).count();
            let closes = ofx.lines().filter(|l| *l == format!("</{tag}>")).count();
            assert_eq!(opens, closes, "{tag}");
        }
    }

    #[test]
    fn empty_statement_uses_generation_date() {
        let mut stmt = sample();
        stmt.transactions.clear();
        let ofx = render(&stmt, generated());
        assert_eq!(values(&ofx, "DTSTART"), vec!["20220401"]);
        assert!(values(&ofx, "STMTTRN").is_empty());
    }

    #[test]
    fn escape_flattens_markup_and_newlines() {
        assert_eq!(escape(" a<b>&c\nd "), "a&lt;b&gt;&amp;c d");
    }
}
