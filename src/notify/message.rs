//! Shared order email templating.
//!
//! Every provider sends the same message; they differ only in the wire call.

use serde_json::{Value, json};

use crate::models::{Config, Order};

/// Storefront identity embedded in every email.
#[derive(Debug, Clone)]
pub struct Branding {
    pub brand: String,
    pub support_url: String,
    pub site_url: String,
    pub currency: String,
    pub link_validity_days: i64,
}

impl Branding {
    pub fn from_config(config: &Config) -> Self {
        Self {
            brand: config.mail.brand.clone(),
            support_url: config.mail.support_url.clone(),
            site_url: config.server.site_url.trim_end_matches('/').to_string(),
            currency: config.pricing.currency.clone(),
            link_validity_days: config.fulfillment.link_validity_days,
        }
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A rendered order notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn product_label(order: &Order) -> &str {
    if order.product_name.trim().is_empty() {
        &order.product_id
    } else {
        &order.product_name
    }
}

pub fn subject(order: &Order, branding: &Branding) -> String {
    format!("✅ Заказ #{} оплачен - {}", order.order_id, branding.brand)
}

pub fn text_body(order: &Order, download_url: &str, branding: &Branding) -> String {
    format!(
        "Заказ #{id} успешно оплачен!\n\
         \n\
         Циферблат: {product}\n\
         Сумма: {price} {currency}\n\
         Дата: {paid}\n\
         \n\
         Ссылка для скачивания:\n\
         {url}\n\
         \n\
         Ссылка активна {days} дней.\n\
         \n\
         Поддержка: {support}\n\
         \n\
         {brand}\n",
        id = order.order_id,
        product = product_label(order),
        price = order.price,
        currency = branding.currency,
        paid = order.paid_at_local(),
        url = download_url,
        days = branding.link_validity_days,
        support = branding.support_url,
        brand = branding.brand,
    )
}

pub fn html_body(order: &Order, download_url: &str, branding: &Branding) -> String {
    let url = escape_html(download_url);
    let support = escape_html(&branding.support_url);
    let brand = escape_html(&branding.brand);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background: #8b7355; color: white; padding: 20px; text-align: center; border-radius: 10px 10px 0 0; }}
        .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
        .btn {{ display: inline-block; background: #8b7355; color: white; padding: 12px 30px; text-decoration: none; border-radius: 25px; margin: 20px 0; }}
        .footer {{ margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>✅ Заказ #{id} оплачен</h1>
        </div>
        <div class="content">
            <h2>{brand}</h2>
            <p><strong>Циферблат:</strong> {product}</p>
            <p><strong>Сумма:</strong> {price} {currency}</p>
            <p><strong>Дата оплаты:</strong> {paid}</p>
            <p style="margin: 25px 0;">Ссылка для скачивания файла:</p>
            <a href="{url}" class="btn">📥 Скачать циферблат</a>
            <p>Или скопируйте ссылку:</p>
            <p style="background: #eee; padding: 10px; border-radius: 5px; word-break: break-all;">{url}</p>
            <div class="footer">
                <p>Ссылка активна {days} дней.</p>
                <p>Поддержка: <a href="{support}">{support}</a></p>
            </div>
        </div>
    </div>
</body>
</html>
"#,
        id = order.order_id,
        brand = brand,
        product = escape_html(product_label(order)),
        price = order.price,
        currency = escape_html(&branding.currency),
        paid = escape_html(&order.paid_at_local()),
        url = url,
        days = branding.link_validity_days,
        support = support,
    )
}

/// Render the full notification for an order.
pub fn render(order: &Order, download_url: &str, branding: &Branding) -> OrderEmail {
    OrderEmail {
        to: order.customer_email.clone(),
        subject: subject(order, branding),
        text: text_body(order, download_url, branding),
        html: html_body(order, download_url, branding),
    }
}

/// Variables for template-based providers that render the email themselves.
pub fn template_params(order: &Order, download_url: &str, branding: &Branding) -> Value {
    let customer_name = order
        .customer_email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_string();

    json!({
        "orderId": order.order_id,
        "productId": order.product_id,
        "productName": product_label(order),
        "customerEmail": order.customer_email,
        "customer_name": customer_name,
        "price": order.price,
        "currency": branding.currency,
        "paidAt": order.paid_at_local(),
        "downloadUrl": download_url,
        "siteUrl": branding.site_url,
        "supportUrl": branding.support_url,
        "validityDays": branding.link_validity_days,
    })
}

/// Split `Name <address>` into its parts; a bare address has no name.
pub fn split_sender(sender: &str) -> (Option<String>, String) {
    let sender = sender.trim();
    match (sender.find('<'), sender.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = sender[..open].trim().trim_matches('"').trim();
            let address = sender[open + 1..close].trim().to_string();
            let name = (!name.is_empty()).then(|| name.to_string());
            (name, address)
        }
        _ => (None, sender.to_string()),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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
