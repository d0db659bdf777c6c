//! Cross-module tests of the merge pipeline.
