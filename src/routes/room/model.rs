use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PublicRoomsQuery {
    pub university_domain: Option<String>,
}
