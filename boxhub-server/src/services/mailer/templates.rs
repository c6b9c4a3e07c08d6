//! Email bodies, each returned as `(html, text)`

use crate::db::models::{Order, OrderStatus};
use crate::orders::money::format_amount;

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Shared shell around a block of paragraphs
fn layout(shop: &str, heading: &str, paragraphs: &[String]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!(r#"<p style="margin: 0 0 16px; line-height: 1.6;">{p}</p>"#))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{heading}</title></head>
<body style="margin: 0; padding: 24px; font-family: Arial, sans-serif; background: #f7f4ef; color: #2b2b2b;">
  <div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; padding: 32px;">
    <div style="font-size: 20px; font-weight: 700; margin-bottom: 8px;">{shop}</div>
    <h1 style="font-size: 22px; margin: 0 0 24px;">{heading}</h1>
    {body}
  </div>
</body>
</html>"#,
        shop = escape(shop),
        heading = escape(heading),
    )
}

pub fn otp_code(shop: &str, name: &str, code: &str, ttl_minutes: i64, reset: bool) -> (String, String) {
    let purpose = if reset {
        "reset your password"
    } else {
        "verify your email address"
    };
    let html = layout(
        shop,
        "Your verification code",
        &[
            format!("Hi {},", escape(name)),
            format!("Use this code to {purpose}:"),
            format!(
                r#"<span style="font-size: 28px; font-weight: 700; letter-spacing: 6px;">{}</span>"#,
                escape(code)
            ),
            format!("The code expires in {ttl_minutes} minutes. If you did not request it, you can ignore this email."),
        ],
    );
    let text = format!(
        "Hi {name},\n\nUse this code to {purpose}: {code}\n\nThe code expires in {ttl_minutes} minutes."
    );
    (html, text)
}

fn item_lines(order: &Order) -> (String, String) {
    let html = order
        .items
        .iter()
        .map(|i| {
            format!(
                "{} × {} @ {}",
                i.quantity,
                escape(&i.name),
                format_amount(i.price)
            )
        })
        .collect::<Vec<_>>()
        .join("<br>");
    let text = order
        .items
        .iter()
        .map(|i| format!("  {} x {} @ {}", i.quantity, i.name, format_amount(i.price)))
        .collect::<Vec<_>>()
        .join("\n");
    (html, text)
}

pub fn order_confirmation(shop: &str, order: &Order) -> (String, String) {
    let (items_html, items_text) = item_lines(order);
    let payment_note = if order.payment_method == crate::db::models::PaymentMethod::BankTransfer {
        "Please transfer the total and upload your receipt from your order page so we can verify the payment."
    } else {
        "You will pay on delivery."
    };
    let html = layout(
        shop,
        "Thank you for your order!",
        &[
            format!("Hi {},", escape(&order.customer.name)),
            format!(
                "We received order <strong>{}</strong>.",
                escape(&order.order_number)
            ),
            items_html,
            format!("Total: <strong>{}</strong>", format_amount(order.total_price)),
            payment_note.to_string(),
        ],
    );
    let text = format!(
        "Hi {},\n\nWe received order {}.\n\n{}\n\nTotal: {}\n\n{}",
        order.customer.name,
        order.order_number,
        items_text,
        format_amount(order.total_price),
        payment_note
    );
    (html, text)
}

pub fn order_status_update(shop: &str, order: &Order) -> (String, String) {
    let headline = match order.status {
        OrderStatus::Pending => "is pending",
        OrderStatus::Processing => "is being prepared",
        OrderStatus::Shipped => "is on its way",
        OrderStatus::Delivered => "has been delivered",
        OrderStatus::Cancelled => "has been cancelled",
    };
    let tracking = order
        .tracking_number
        .as_deref()
        .map(|t| format!("Tracking number: {t}"));

    let mut paragraphs = vec![
        format!("Hi {},", escape(&order.customer.name)),
        format!(
            "Your order <strong>{}</strong> {headline}.",
            escape(&order.order_number)
        ),
    ];
    if let Some(tracking) = &tracking {
        paragraphs.push(escape(tracking));
    }
    let html = layout(shop, "Order update", &paragraphs);

    let mut text = format!(
        "Hi {},\n\nYour order {} {headline}.",
        order.customer.name, order.order_number
    );
    if let Some(tracking) = tracking {
        text.push_str("\n\n");
        text.push_str(&tracking);
    }
    (html, text)
}

pub fn payment_verified(shop: &str, order: &Order) -> (String, String) {
    let html = layout(
        shop,
        "Payment verified",
        &[
            format!("Hi {},", escape(&order.customer.name)),
            format!(
                "We verified your payment of <strong>{}</strong> for order <strong>{}</strong>. We are preparing your box.",
                format_amount(order.total_price),
                escape(&order.order_number)
            ),
        ],
    );
    let text = format!(
        "Hi {},\n\nWe verified your payment of {} for order {}. We are preparing your box.",
        order.customer.name,
        format_amount(order.total_price),
        order.order_number
    );
    (html, text)
}

pub fn payment_rejected(shop: &str, order: &Order) -> (String, String) {
    let reason = order
        .payment_rejection_reason
        .as_deref()
        .unwrap_or("The receipt could not be matched to a transfer.");
    let html = layout(
        shop,
        "There is an issue with your payment",
        &[
            format!("Hi {},", escape(&order.customer.name)),
            format!(
                "We could not verify the receipt for order <strong>{}</strong>.",
                escape(&order.order_number)
            ),
            format!("Reason: {}", escape(reason)),
            "Please upload a new receipt from your order page.".to_string(),
        ],
    );
    let text = format!(
        "Hi {},\n\nWe could not verify the receipt for order {}.\nReason: {}\n\nPlease upload a new receipt from your order page.",
        order.customer.name, order.order_number, reason
    );
    (html, text)
}

pub fn contact_reply(shop: &str, name: &str, subject: &str, reply: &str) -> (String, String) {
    let html = layout(
        shop,
        &format!("Re: {subject}"),
        &[
            format!("Hi {},", escape(name)),
            escape(reply).replace('\n', "<br>"),
        ],
    );
    let text = format!("Hi {name},\n\n{reply}");
    (html, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"Tom & Jo\"</b>"), "&lt;b&gt;&quot;Tom &amp; Jo&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_otp_contains_code() {
        let (html, text) = otp_code("BoxHub", "Ana", "123456", 10, false);
        assert!(html.contains("123456"));
        assert!(text.contains("verify your email address"));
        let (_, text) = otp_code("BoxHub", "Ana", "654321", 10, true);
        assert!(text.contains("reset your password"));
    }

    #[test]
    fn test_contact_reply_escapes_html() {
        let (html, text) = contact_reply("BoxHub", "Kai", "Hi", "<script>x</script>\nBye");
        assert!(!html.contains("<script>"));
        assert!(html.contains("<br>Bye"));
        assert!(text.ends_with("<script>x</script>\nBye"));
    }
}
