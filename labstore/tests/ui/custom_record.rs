use labstore::{Record, RecordField, RecordKind};
use serde::{Deserialize, Serialize};

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[kind(Component)]
struct Kit {
    #[id]
    kit_id: String,
    part_count: u32,
}

fn main() {
    let kit = Kit {
        kit_id: "kit-1".into(),
        part_count: 12,
    };
    assert_eq!(kit.id(), "kit-1");
    assert_eq!(Kit::KIND, RecordKind::Component);
    assert_eq!(KitField::KitId.name(), "kitId");
    assert_eq!(KitField::PartCount.name(), "partCount");
}
