//! Feed response builder shared by unit and integration tests

/// Build a feed body: one `<record>` per `(ddmmYYYYHHMMSS, [(name, value)])`
pub fn feed_body(source: &str, records: &[(&str, &[(&str, &str)])]) -> String {
    let mut body = String::from("<?xml version=\"1.0\"?><records>");
    for (date_time, values) in records {
        body.push_str("<record><dateTime>");
        body.push_str(date_time);
        body.push_str("</dateTime>");
        for (name, value) in values.iter() {
            body.push_str(&format!(
                "<field><id>{}.{}</id><value>{}</value></field>",
                source, name, value
            ));
        }
        body.push_str("</record>");
    }
    body.push_str("</records>");
    body
}
