mod descriptor_tests;
