mod payment_order;

pub use payment_order::{
    DEFAULT_CURRENCY, MAX_IDEMPOTENCY_KEY_LEN, OrderTerms, PaymentOrderRecord, PaymentOrderRequest, ValidatedOrder,
    normalize_amount, normalize_currency,
};
