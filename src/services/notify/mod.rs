pub mod telegram;

use async_trait::async_trait;

use crate::models::Booking;

/// Delivers operator alerts. Delivery is best-effort: callers log failures
/// and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// Used when no operator channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        tracing::info!(%message, "operator notification");
        Ok(())
    }
}

pub fn format_toman(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn payment_submitted_message(booking: &Booking, teacher_name: &str) -> String {
    let draft = &booking.draft;
    format!(
        "💳 پرداخت جدید در انتظار تأیید\n\
         دانشجو: {} ({})\n\
         استاد: {}\n\
         جلسات: {} × {} دقیقه ({})\n\
         روزها: {}\n\
         ساعت‌ها: {}\n\
         مبلغ: {} تومان\n\
         شناسه تراکنش: {}\n\
         کد رزرو: {}",
        draft.student_name,
        draft.student_email,
        teacher_name,
        draft.number_of_sessions,
        draft.duration,
        draft.session_type.as_str(),
        draft.selected_days.join("، "),
        draft.selected_hours.join("، "),
        format_toman(draft.total_price),
        booking.transaction_id,
        booking.id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_toman() {
        assert_eq!(format_toman(0), "0");
        assert_eq!(format_toman(950), "950");
        assert_eq!(format_toman(400_000), "400,000");
        assert_eq!(format_toman(1_250_000), "1,250,000");
        assert_eq!(format_toman(-12_000), "-12,000");
    }
}
