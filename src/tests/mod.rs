
mod test_write_position;
