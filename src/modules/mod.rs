pub mod text_record;
pub mod upload;
