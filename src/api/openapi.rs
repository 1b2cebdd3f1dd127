//! The OpenAPI v3 service description served at `/v1/openapi.json` and
//! printed by `--openapi`.

use serde_json::{json, Value};

/// Build the service description document.
pub fn spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "pgEdge RAG Server",
            "description": "Retrieval-Augmented Generation API for PostgreSQL with pgvector. \
                Performs hybrid (vector + BM25) retrieval over configured tables and \
                generates grounded answers with the configured LLM.",
            "version": env!("CARGO_PKG_VERSION"),
            "license": {
                "name": "PostgreSQL License",
                "url": "https://opensource.org/licenses/PostgreSQL"
            }
        },
        "servers": [
            {"url": "/v1", "description": "API v1"}
        ],
        "paths": {
            "/openapi.json": {
                "get": {
                    "summary": "This service description",
                    "operationId": "getOpenApi",
                    "responses": {
                        "200": {
                            "description": "OpenAPI v3 document",
                            "content": {"application/json": {"schema": {"type": "object"}}}
                        }
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Health check",
                    "operationId": "getHealth",
                    "responses": {
                        "200": {
                            "description": "Service is healthy",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "status": {"type": "string", "example": "healthy"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/pipelines": {
                "get": {
                    "summary": "List configured pipelines",
                    "operationId": "listPipelines",
                    "responses": {
                        "200": {
                            "description": "Available pipelines",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "pipelines": {
                                                "type": "array",
                                                "items": {"$ref": "#/components/schemas/PipelineInfo"}
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/pipelines/{name}": {
                "post": {
                    "summary": "Run a RAG query against a pipeline",
                    "operationId": "queryPipeline",
                    "parameters": [
                        {
                            "name": "name",
                            "in": "path",
                            "required": true,
                            "schema": {"type": "string"},
                            "description": "Pipeline name"
                        }
                    ],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/QueryRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Query answer, or an SSE stream when `stream` is true",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/QueryResponse"}
                                },
                                "text/event-stream": {
                                    "schema": {"$ref": "#/components/schemas/StreamEvent"}
                                }
                            }
                        },
                        "400": {"$ref": "#/components/responses/Error"},
                        "404": {"$ref": "#/components/responses/Error"},
                        "500": {"$ref": "#/components/responses/Error"}
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "PipelineInfo": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"}
                    }
                },
                "QueryRequest": {
                    "type": "object",
                    "required": ["query"],
                    "properties": {
                        "query": {"type": "string", "description": "The question to answer"},
                        "stream": {"type": "boolean", "default": false},
                        "top_n": {"type": "integer", "minimum": 1},
                        "include_sources": {"type": "boolean", "default": false},
                        "filter": {"$ref": "#/components/schemas/Filter"},
                        "messages": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Message"}
                        }
                    }
                },
                "Filter": {
                    "type": "object",
                    "properties": {
                        "conditions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["column", "operator"],
                                "properties": {
                                    "column": {"type": "string"},
                                    "operator": {
                                        "type": "string",
                                        "enum": ["=", "!=", "<", ">", "<=", ">=", "LIKE", "ILIKE",
                                                 "IN", "NOT IN", "IS NULL", "IS NOT NULL"]
                                    },
                                    "value": {}
                                }
                            }
                        },
                        "logic": {"type": "string", "enum": ["AND", "OR"], "default": "AND"}
                    }
                },
                "Message": {
                    "type": "object",
                    "required": ["role", "content"],
                    "properties": {
                        "role": {"type": "string", "enum": ["user", "assistant"]},
                        "content": {"type": "string"}
                    }
                },
                "QueryResponse": {
                    "type": "object",
                    "properties": {
                        "answer": {"type": "string"},
                        "sources": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Source"}
                        },
                        "tokens_used": {"type": "integer"}
                    }
                },
                "Source": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "content": {"type": "string"},
                        "score": {"type": "number"}
                    }
                },
                "StreamEvent": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {
                        "type": {"type": "string", "enum": ["chunk", "done", "error"]},
                        "content": {"type": "string"},
                        "error": {"type": "string"}
                    }
                }
            },
            "responses": {
                "Error": {
                    "description": "Error envelope",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "error": {
                                        "type": "object",
                                        "properties": {
                                            "code": {"type": "string"},
                                            "message": {"type": "string"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
