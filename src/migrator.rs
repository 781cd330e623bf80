use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_condition_reports_table::Migration),
            Box::new(m20240301_000002_create_repair_slips_table::Migration),
            Box::new(m20240301_000003_create_damage_invoices_table::Migration),
            Box::new(m20240301_000004_create_inventory_adjustments_table::Migration),
            Box::new(m20240301_000005_create_document_sequences_table::Migration),
        ]
    }
}

mod m20240301_000001_create_condition_reports_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_condition_reports_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConditionReports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConditionReports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConditionReports::ReportNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ConditionReports::Status).string().not_null())
                        .col(
                            ColumnDef::new(ConditionReports::Archived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ConditionReports::Version)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConditionReports::Document).json().not_null())
                        .col(
                            ColumnDef::new(ConditionReports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConditionReports::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConditionReports::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ConditionReports {
        Table,
        Id,
        ReportNumber,
        Status,
        Archived,
        Version,
        Document,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_repair_slips_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_repair_slips_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No foreign key: deleting a report unlinks its slips instead of cascading
            manager
                .create_table(
                    Table::create()
                        .table(RepairSlips::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairSlips::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairSlips::SlipNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(RepairSlips::ConditionReportId).uuid().null())
                        .col(ColumnDef::new(RepairSlips::Status).string().not_null())
                        .col(ColumnDef::new(RepairSlips::Version).big_integer().not_null())
                        .col(ColumnDef::new(RepairSlips::Document).json().not_null())
                        .col(
                            ColumnDef::new(RepairSlips::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairSlips::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_repair_slips_condition_report_id")
                        .table(RepairSlips::Table)
                        .col(RepairSlips::ConditionReportId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RepairSlips::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RepairSlips {
        Table,
        Id,
        SlipNumber,
        ConditionReportId,
        Status,
        Version,
        Document,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_damage_invoices_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_damage_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DamageInvoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DamageInvoices::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DamageInvoices::InvoiceNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DamageInvoices::RepairSlipId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DamageInvoices::PaymentStatus)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DamageInvoices::DueDate).date().not_null())
                        .col(
                            ColumnDef::new(DamageInvoices::Version)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DamageInvoices::Document).json().not_null())
                        .col(
                            ColumnDef::new(DamageInvoices::IssueDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DamageInvoices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DamageInvoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DamageInvoices {
        Table,
        Id,
        InvoiceNumber,
        RepairSlipId,
        PaymentStatus,
        DueDate,
        Version,
        Document,
        IssueDate,
        UpdatedAt,
    }
}

mod m20240301_000004_create_inventory_adjustments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_inventory_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryAdjustments::Seq)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryAdjustments::Id).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryAdjustments::AdjustmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::ReferenceId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::ItemRef)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::Document)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_adjustments_reference_id")
                        .table(InventoryAdjustments::Table)
                        .col(InventoryAdjustments::ReferenceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryAdjustments {
        Table,
        Seq,
        Id,
        AdjustmentType,
        ReferenceId,
        ItemRef,
        Quantity,
        Document,
        CreatedAt,
    }
}

mod m20240301_000005_create_document_sequences_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_document_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Prefix)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Prefix,
        LastValue,
    }
}
