pub mod payment;

pub use payment::PaymentService;
pub use payment::dto::CreateOrderResponse;
