mod order_repo;

pub use order_repo::{Admission, AdmissionPolicy, InMemoryOrderRepository, OrderRepository};
