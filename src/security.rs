use rand::RngCore;
use std::convert::TryInto;
use std::path::PathBuf;
use std::{env, fs};

const PASSWORD_SALT: &str = "password.salt";
const JWT_SECRET: &str = "jwt.secret";

pub type Salt = [u8; 16];

/// Secret material backing password hashing and JWT signing. Loaded from
/// `SECURITY_DIR` on startup; missing pieces are generated and written back so
/// restarts keep existing sessions and stored hashes valid.
#[derive(Debug, Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Vec<u8>,
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn load() -> Security {
        let dir = security_dir();

        fs::create_dir_all(dir.clone())
            .expect("unable to create directory for storing security information");

        tracing::info!("Loading password salt...");
        let mut salt: Option<Salt> = fs::read(dir.join(PASSWORD_SALT))
            .map(|s| s.try_into().ok())
            .ok()
            .flatten();

        match salt {
            None => {
                tracing::info!("Salt not found in '{}'.", dir.join(PASSWORD_SALT).display());
                tracing::info!("Generating a new password salt.");
                salt = Some(rand::random());

                fs::write(dir.join(PASSWORD_SALT), salt.unwrap()).expect("unable to write salt");
            }
            Some(_) => tracing::info!("Salt found and loaded."),
        }

        tracing::info!("Loading JWT signing secret...");
        let jwt_secret = match fs::read(dir.join(JWT_SECRET)) {
            Ok(secret) if !secret.is_empty() => {
                tracing::info!("Loaded JWT secret.");
                secret
            }
            _ => {
                tracing::info!("JWT secret missing or empty. Generating a new one.");
                let secret = Self::generate_secret();
                fs::write(dir.join(JWT_SECRET), secret.as_slice())
                    .expect("unable to write JWT secret");
                secret
            }
        };

        Security {
            salt: salt.unwrap(),
            jwt_secret,
        }
    }

    pub fn generate_secret() -> Vec<u8> {
        let mut secret = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    }
}
