mod write_batch_test;
