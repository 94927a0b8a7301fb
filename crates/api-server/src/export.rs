//! CSV rendering of grab records.

use database::models::{rfc3339, RedPacketRecord};

use crate::metrics::yuan;

/// Header row of the export file.
pub const CSV_HEADER: &str = "时间,应用,群聊,发送者,金额,消息,状态,响应时间,排名";

/// Render records as CSV with a header row. Fields are quoted per RFC 4180.
pub fn records_to_csv(records: &[RedPacketRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + records.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for record in records {
        let row = [
            rfc3339(&record.created_at),
            record.app.as_str().to_string(),
            record.group_name.clone(),
            record.sender.clone(),
            format!("{:.2}", yuan(record.amount_cents)),
            record.message.clone(),
            record.status.as_str().to_string(),
            record.response_time.to_string(),
            record.rank.map(|rank| rank.to_string()).unwrap_or_default(),
        ];

        let fields: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{AppId, RecordStatus};

    fn record(message: &str, rank: Option<i64>) -> RedPacketRecord {
        RedPacketRecord {
            id: "r1".into(),
            user_id: "u1".into(),
            app: AppId::Wechat,
            group_id: "g1".into(),
            group_name: "家人群".into(),
            sender: "妈妈".into(),
            amount_cents: 888,
            message: message.into(),
            status: RecordStatus::Success,
            response_time: 0.25,
            rank,
            metadata: "{}".into(),
            created_at: "2025-01-01 08:00:00".into(),
        }
    }

    #[test]
    fn test_plain_rows() {
        let csv = records_to_csv(&[record("恭喜发财", Some(2))]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2025-01-01T08:00:00Z,wechat,家人群,妈妈,8.88,恭喜发财,success,0.25,2");
    }

    #[test]
    fn test_quoting() {
        let csv = records_to_csv(&[record("大吉,\"大利\"", None)]);
        assert!(csv.contains(",\"大吉,\"\"大利\"\"\",success,0.25,\n"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(records_to_csv(&[]), format!("{}\n", CSV_HEADER));
    }
}
