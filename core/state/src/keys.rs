// meridian/core/state/src/keys.rs

//! Key layout of the flat key space.

pub fn table(contract: &str, table: &str, key: &str) -> String {
    format!("t/{}/{}/{}", contract, table, key)
}

pub fn contract(id: &str) -> String {
    format!("c/{}", id)
}

pub fn domain(name: &str) -> String {
    format!("d/{}", name)
}

pub fn balance(token: &str, account: &str) -> String {
    format!("b/{}/{}", token, account)
}

pub fn decimal(token: &str) -> String {
    format!("m/{}/decimal", token)
}

pub fn issuer(token: &str) -> String {
    format!("m/{}/issuer", token)
}
