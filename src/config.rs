#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub frontend_url: String,
    pub upload_dir: String,
}

impl Config {
    /// Reads the environment once at startup. Missing required variables are a
    /// deployment error, so this panics with the variable name.
    pub fn init() -> Config {
        let mongodb_uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
        let mongodb_database =
            std::env::var("MONGODB_DATABASE").expect("MONGODB_DATABASE must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let frontend_url = std::env::var("FRONTEND_URL").expect("FRONTEND_URL must be set");
        let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "public/uploads/profile-pictures".to_string());

        Config {
            mongodb_uri,
            mongodb_database,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().expect("JWT_MAXAGE must be a number"),
            port: port.parse::<u16>().expect("PORT must be a port number"),
            frontend_url,
            upload_dir,
        }
    }
}
