use labstore::{Record, RecordField};
use serde::{Deserialize, Serialize};

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[kind(Notification)]
struct Alert {
    #[id]
    id: String,
    r#type: String,
}

fn main() {
    assert_eq!(AlertField::Type.name(), "type");
    assert_eq!(AlertField::Id.name(), "id");
}
