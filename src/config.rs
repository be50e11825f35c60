/// Server configuration, read once at startup from the environment
/// (optionally populated from a `.env` file beforehand).
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub products_file: String,
    /// Shared secret for the save endpoint. Empty means no secret is
    /// configured and every save is rejected.
    pub admin_secret: String,
    pub paypal_client_id: String,
    pub paypal_client_secret: String,
    pub paypal_mode: String,
}

const DEFAULT_PORT: u16 = 4000;

impl Config {
    pub fn from_env() -> Self {
        let port = match envmnt::get_or("PORT", "4000").parse() {
            Ok(port) => port,
            Err(_) => {
                log::warn!("PORT is not a number, falling back to {DEFAULT_PORT}");
                DEFAULT_PORT
            }
        };
        Self {
            host: envmnt::get_or("HOST", "0.0.0.0"),
            port,
            products_file: envmnt::get_or("PRODUCTS_FILE", "products.json"),
            admin_secret: envmnt::get_or("ADMIN_SECRET", ""),
            paypal_client_id: envmnt::get_or("PAYPAL_CLIENT_ID", ""),
            paypal_client_secret: envmnt::get_or("PAYPAL_CLIENT_SECRET", ""),
            paypal_mode: envmnt::get_or("PAYPAL_MODE", "sandbox").to_lowercase(),
        }
    }
}
