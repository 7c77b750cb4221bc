//! User-facing chat texts.

use crate::domain::{format_brl, PendingPayment};

pub const WAITING_CONFIRMATION: &str = "⏳ Aguardando confirmação do pagamento...\n\
    Assim que o pagamento for confirmado, você será adicionado ao grupo automaticamente!";
pub const PIX_FAILED: &str = "❌ Erro ao gerar o PIX. Tente novamente.";
pub const UNEXPECTED_ERROR: &str = "❌ Ocorreu um erro. Tente novamente mais tarde.";

pub const PAYMENT_APPROVED: &str = "✅ Pagamento aprovado com sucesso!";
pub const ADDED_TO_GROUP: &str = "🎉 Você foi adicionado ao grupo automaticamente!";
pub const INVITE_UNAVAILABLE: &str =
    "🔗 Não foi possível liberar seu acesso automaticamente. Entre em contato com o suporte.";
pub const PAYMENT_DECLINED: &str = "❌ Pagamento não foi aprovado. Tente novamente com /pagar";
pub const VERIFICATION_EXPIRED: &str =
    "⏰ Tempo de verificação expirou. Se você pagou, entre em contato com o suporte.";

pub const STATUS_PENDING: &str = "⏳ Você tem um pagamento pendente sendo verificado...";
pub const STATUS_NONE: &str = "✅ Você não tem pagamentos pendentes.";

pub fn welcome(amount_cents: i64) -> String {
    format!(
        "🤖 Bem-vindo ao Bot de Pagamentos!\n\n\
         Use /pagar para gerar um PIX de {} e ter acesso ao grupo VIP.\n\n\
         Após o pagamento, você será adicionado automaticamente!",
        format_brl(amount_cents)
    )
}

pub fn pix_created(amount_cents: i64, expiry_hours: i64) -> String {
    format!(
        "💰 <b>PIX gerado com sucesso!</b>\n\n\
         Valor: {}\n\
         Validade: {} horas\n\n\
         📱 Copie o código abaixo e cole no seu app de pagamento:",
        format_brl(amount_cents),
        expiry_hours
    )
}

pub fn pix_code(code: &str) -> String {
    format!("<code>{}</code>", escape_html(code))
}

pub fn invite_link(link: &str) -> String {
    format!("🔗 Acesse o grupo através deste link:\n{}", link)
}

pub fn support_timeout_alert(payment: &PendingPayment, attempts: u32) -> String {
    format!(
        "⚠️ Pagamento {} (usuário {}) sem confirmação após {} verificações. \
         O acompanhamento foi encerrado; confira manualmente.",
        payment.payment_id, payment.user_id, attempts
    )
}

pub fn pending_list(payments: &[PendingPayment], now: chrono::DateTime<chrono::Utc>) -> String {
    if payments.is_empty() {
        return "📭 Nenhum pagamento pendente.".to_string();
    }

    let mut text = format!("📋 {} pagamento(s) pendente(s):\n", payments.len());
    for payment in payments {
        text.push_str(&format!(
            "\n• {} | usuário {} | chat {} | há {} min",
            payment.payment_id,
            payment.user_id,
            payment.chat_id,
            payment.age(now).num_minutes()
        ));
    }
    text
}

pub fn sweep_report(removed: usize) -> String {
    format!("🧹 {} pagamento(s) antigo(s) removido(s).", removed)
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(pix_code("0002<01>"), "<code>0002&lt;01&gt;</code>");
    }

    #[test]
    fn test_pending_list() {
        let now = Utc::now();
        let mut payment = PendingPayment::new("P1", 7, 8);
        payment.created_at = now - Duration::minutes(5);

        let text = pending_list(&[payment], now);
        assert!(text.contains("1 pagamento(s)"));
        assert!(text.contains("P1 | usuário 7 | chat 8 | há 5 min"));
        assert!(pending_list(&[], now).contains("Nenhum"));
    }

    #[test]
    fn test_welcome_shows_price() {
        assert!(welcome(2500).contains("R$ 25,00"));
    }
}
