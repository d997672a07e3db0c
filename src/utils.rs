use subtle::ConstantTimeEq;

/// Compares two secrets in time independent of where they first differ.
pub fn secure_compare(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// The single username/password pair allowed to write.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        // both halves are compared even when the username already failed
        let username_correct = secure_compare(username, &self.username);
        let password_correct = secure_compare(password, &self.password);
        username_correct & password_correct
    }
}
