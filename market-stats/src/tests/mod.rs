pub mod row_construction;
