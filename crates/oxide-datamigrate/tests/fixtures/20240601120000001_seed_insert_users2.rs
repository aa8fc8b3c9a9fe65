// Generated by oxide-datamigrate. Do not edit by hand.

use oxide_datamigrate::prelude::*;

pub struct SeedInsertUsers2;

impl DataMigration for SeedInsertUsers2 {
    const VERSION: &'static str = "20240601120000001";
    const NAME: &'static str = "SeedInsertUsers2";

    fn up() -> RowChange {
        RowChange::insert("users")
            .columns(["id", "name"])
            .values([
                Value::Integer(2),
                Value::from("C"),
            ])
            .into()
    }

    fn down() -> Option<RowChange> {
        Some(
            RowChange::delete("users")
                .filter("id", Value::Integer(2))
                .into(),
        )
    }
}
