use crate::models::order::OrderJob;

/// Render the `order.xml` metadata document for a job.
///
/// The raw webhook body is embedded verbatim in a CDATA section for audit.
pub fn render_order_xml(job: &OrderJob) -> String {
    let ctx = &job.context;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Order>
  <OrderId>{order_id}</OrderId>
  <MasterAssetId>{asset}</MasterAssetId>
  <Email>{email}</Email>
  <TotalPrice>{total}</TotalPrice>
  <Currency>{currency}</Currency>
  <RawPayload><![CDATA[{raw}]]></RawPayload>
</Order>
"#,
        order_id = escape_text(&job.order_id),
        asset = escape_text(&job.master_asset_id),
        email = escape_text(ctx.email.as_deref().unwrap_or_default()),
        total = escape_text(ctx.total_price.as_deref().unwrap_or_default()),
        currency = escape_text(ctx.currency.as_deref().unwrap_or_default()),
        raw = cdata_safe(&job.raw_payload.to_string()),
    )
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A literal `]]>` would close the section early; split it across two sections.
fn cdata_safe(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}
