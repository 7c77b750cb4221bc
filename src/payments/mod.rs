use async_trait::async_trait;
use crate::domain::{CreatePixPayment, PaymentStatus, PixCharge};
use crate::error::Result;

pub mod mercadopago_client;

pub use mercadopago_client::MercadoPagoClient;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;
    async fn health_check(&self) -> Result<()>;
    async fn create_pix(&self, request: &CreatePixPayment) -> Result<PixCharge>;
    async fn get_status(&self, payment_id: &str) -> Result<PaymentStatus>;
}
