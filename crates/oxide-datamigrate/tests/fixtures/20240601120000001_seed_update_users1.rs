// Generated by oxide-datamigrate. Do not edit by hand.

use oxide_datamigrate::prelude::*;

pub struct SeedUpdateUsers1;

impl DataMigration for SeedUpdateUsers1 {
    const VERSION: &'static str = "20240601120000001";
    const NAME: &'static str = "SeedUpdateUsers1";

    fn up() -> RowChange {
        RowChange::update("users")
            .set("name", Value::from("B"))
            .filter("id", Value::Integer(1))
            .into()
    }

    fn down() -> Option<RowChange> {
        Some(
            RowChange::update("users")
                .set("name", Value::from("A"))
                .filter("id", Value::Integer(1))
                .into(),
        )
    }
}
